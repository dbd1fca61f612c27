use compact_str::{CompactString, format_compact};
use log::{debug, warn};

use crate::instruction::{ArithmeticOp, Instruction, Segment, render};

use super::{
    ast::{
        BinaryOp, Class, ClassVarKind, Expr, Ident, KeywordConstant, Statement, SubroutineCall,
        SubroutineDec, SubroutineKind, Type, UnaryOp,
    },
    error::{CompileResult, SemanticError},
    options::OutputLayout,
    symbol_table::{Scope, StorageClass, Symbol, SymbolError, SymbolTable},
};

/// The largest integer constant the VM can push.
pub const MAX_INTEGER_CONSTANT: u32 = 32767;

/// A diagnostic that does not stop compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub line: u32,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// The VM code of one class.
#[derive(Clone, Debug, PartialEq)]
pub struct LoweredClass {
    pub name: CompactString,
    pub instructions: Vec<Instruction>,
    pub warnings: Vec<Warning>,
}

impl LoweredClass {
    /// Renders the instructions as VM text.
    pub fn render(&self, layout: OutputLayout) -> String {
        render(&self.instructions, layout)
    }
}

/// The class being lowered.
#[derive(Copy, Clone, Debug)]
pub struct ClassDescriptor<'a> {
    pub name: &'a str,
    /// The size of an instance, allocated by constructors.
    pub field_count: u16,
}

/// The subroutine being lowered.
#[derive(Copy, Clone, Debug)]
pub struct SubroutineDescriptor<'a> {
    pub name: &'a str,
    pub kind: SubroutineKind,
    pub return_type: Type<'a>,
}

/// Lowers a class to VM instructions.
pub fn lower_class<'a>(class: &'a Class<'a>) -> CompileResult<LoweredClass> {
    let mut generator = CodeGenerator::new(class.name.name);
    generator.lower_class(class)?;
    Ok(LoweredClass {
        name: CompactString::new(class.name.name),
        instructions: generator.instructions,
        warnings: generator.warnings,
    })
}

/// Walks a class AST and emits the instructions of each subroutine in order.
pub struct CodeGenerator<'a> {
    class: ClassDescriptor<'a>,
    /// Set while lowering the body of a subroutine.
    subroutine: Option<SubroutineDescriptor<'a>>,
    symbols: SymbolTable<'a>,
    instructions: Vec<Instruction>,
    warnings: Vec<Warning>,
    /// The next free label number. Shared by every subroutine of the class.
    next_label: u32,
    /// The line of the statement being lowered.
    line: u32,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(class_name: &'a str) -> CodeGenerator<'a> {
        CodeGenerator {
            class: ClassDescriptor {
                name: class_name,
                field_count: 0,
            },
            subroutine: None,
            symbols: SymbolTable::new(),
            instructions: Vec::new(),
            warnings: Vec::new(),
            next_label: 0,
            line: 0,
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    fn push(&mut self, segment: Segment, index: u16) {
        self.emit(Instruction::Push(segment, index));
    }

    fn pop(&mut self, segment: Segment, index: u16) {
        self.emit(Instruction::Pop(segment, index));
    }

    fn arithmetic(&mut self, op: ArithmeticOp) {
        self.emit(Instruction::Arithmetic(op));
    }

    fn call(&mut self, name: CompactString, args: usize) {
        let args = u16::try_from(args).unwrap_or(u16::MAX);
        self.emit(Instruction::Call { name, args });
    }

    fn warn(&mut self, line: u32, message: String) {
        let warning = Warning { line, message };
        warn!("{class}: {warning}", class = self.class.name);
        self.warnings.push(warning);
    }

    fn next_label(&mut self) -> u32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    fn subroutine_kind(&self) -> Option<SubroutineKind> {
        self.subroutine.map(|s| s.kind)
    }

    pub fn lower_class(&mut self, class: &'a Class<'a>) -> CompileResult<()> {
        debug!("Lowering class {}.", class.name.name);
        self.symbols.reset(Scope::Class);
        for var in class.vars {
            let storage = match var.kind {
                ClassVarKind::Static => StorageClass::Static,
                ClassVarKind::Field => StorageClass::Field,
            };
            for name in var.names {
                self.define(Scope::Class, *name, var.var_type, storage)?;
            }
        }
        self.class.field_count = self.symbols.count(StorageClass::Field);
        for subroutine in class.subroutines {
            self.lower_subroutine(subroutine)?;
        }
        Ok(())
    }

    fn define(
        &mut self,
        scope: Scope,
        name: Ident<'a>,
        var_type: Type<'a>,
        storage: StorageClass,
    ) -> CompileResult<()> {
        if var_type == Type::Void {
            return Err(SemanticError::VoidVariable {
                name: name.name.into(),
                line: name.line,
            }
            .into());
        }
        match self.symbols.add_symbol(scope, name.name, var_type, storage) {
            Ok(_) => Ok(()),
            Err(SymbolError::Duplicate) => Err(SemanticError::DuplicateSymbol {
                name: name.name.into(),
                line: name.line,
            }
            .into()),
            Err(SymbolError::WrongScope { storage, .. }) => {
                Err(SemanticError::StorageClassMismatch {
                    name: name.name.into(),
                    storage: storage.as_str(),
                    line: name.line,
                }
                .into())
            }
        }
    }

    fn lower_subroutine(&mut self, subroutine: &'a SubroutineDec<'a>) -> CompileResult<()> {
        let name = subroutine.name;
        debug!(
            "Lowering {kind} {class}.{name}.",
            kind = subroutine.kind,
            class = self.class.name,
            name = name.name
        );
        self.line = name.line;
        if subroutine.kind == SubroutineKind::Constructor
            && subroutine.return_type != Type::Class(self.class.name)
        {
            return Err(SemanticError::ConstructorReturnType {
                subroutine: name.name.into(),
                expected: self.class.name.into(),
                found: format_compact!("{}", subroutine.return_type),
                line: name.line,
            }
            .into());
        }

        self.symbols.start_subroutine(subroutine.kind, self.class.name);
        for param in subroutine.params {
            self.define(
                Scope::Subroutine,
                param.name,
                param.param_type,
                StorageClass::Argument,
            )?;
        }
        for local in subroutine.locals {
            for local_name in local.names {
                self.define(
                    Scope::Subroutine,
                    *local_name,
                    local.var_type,
                    StorageClass::Local,
                )?;
            }
        }

        self.emit(Instruction::Function {
            name: format_compact!("{}.{}", self.class.name, name.name),
            locals: self.symbols.count(StorageClass::Local),
        });
        match subroutine.kind {
            SubroutineKind::Constructor => {
                self.push(Segment::Constant, self.class.field_count);
                self.call("Memory.alloc".into(), 1);
                self.pop(Segment::Pointer, 0);
            }
            SubroutineKind::Method => {
                self.push(Segment::Argument, 0);
                self.pop(Segment::Pointer, 0);
            }
            SubroutineKind::Function => {}
        }

        if !subroutine.has_return() {
            self.warn(
                name.line,
                format!("subroutine '{}' has no return statement", name.name),
            );
        }

        let descriptor = SubroutineDescriptor {
            name: name.name,
            kind: subroutine.kind,
            return_type: subroutine.return_type,
        };
        self.subroutine = Some(descriptor);
        let result = self.lower_statements(descriptor, subroutine.body);
        self.subroutine = None;
        result
    }

    fn lower_statements(
        &mut self,
        subroutine: SubroutineDescriptor<'a>,
        statements: &'a [Statement<'a>],
    ) -> CompileResult<()> {
        for statement in statements {
            self.lower_statement(subroutine, statement)?;
        }
        Ok(())
    }

    fn lower_statement(
        &mut self,
        subroutine: SubroutineDescriptor<'a>,
        statement: &'a Statement<'a>,
    ) -> CompileResult<()> {
        match statement {
            Statement::Let {
                target,
                index,
                value,
            } => {
                self.line = target.line;
                match index {
                    None => self.lower_assignment(*target, value),
                    Some(index) => self.lower_subscript_assignment(*target, index, value),
                }
            }
            Statement::If {
                condition,
                then_block,
                else_block,
            } => self.lower_if(subroutine, condition, then_block, *else_block),
            Statement::While { condition, body } => {
                self.lower_while(subroutine, condition, body)
            }
            Statement::Do(call) => {
                self.line = call.name.line;
                self.lower_call(call)?;
                self.pop(Segment::Temp, 0);
                Ok(())
            }
            Statement::Return { value, line } => {
                self.line = *line;
                self.lower_return(subroutine, *value, *line)
            }
        }
    }

    fn lower_assignment(&mut self, target: Ident<'a>, value: &'a Expr<'a>) -> CompileResult<()> {
        let symbol = self.resolve(target)?;
        let value_type = self.expr_type(value);
        match (symbol.symbol_type, value_type) {
            (Type::Boolean, Some(Type::Int)) => self.warn(
                target.line,
                format!("implicit conversion from int to boolean assigning '{}'", target.name),
            ),
            (Type::Int, Some(Type::Boolean)) => self.warn(
                target.line,
                format!("implicit conversion from boolean to int assigning '{}'", target.name),
            ),
            _ => {}
        }
        self.lower_expr(value)?;
        self.pop(symbol.storage.segment(), symbol.index);
        Ok(())
    }

    /// `let target[index] = value;`
    ///
    /// The value is evaluated before the address so subscripts on the right hand side can use
    /// `pointer 1` freely. The value stays on the stack below the address until `pop that 0`.
    fn lower_subscript_assignment(
        &mut self,
        target: Ident<'a>,
        index: &'a Expr<'a>,
        value: &'a Expr<'a>,
    ) -> CompileResult<()> {
        let symbol = self.resolve(target)?;
        self.lower_expr(value)?;
        self.lower_expr(index)?;
        self.push(symbol.storage.segment(), symbol.index);
        self.arithmetic(ArithmeticOp::Add);
        self.pop(Segment::Pointer, 1);
        self.pop(Segment::That, 0);
        Ok(())
    }

    fn check_condition(&mut self, condition: &'a Expr<'a>, statement: &str) {
        let line = line_of(condition).unwrap_or(self.line);
        self.line = line;
        if let Some(condition_type) = self.expr_type(condition) {
            if condition_type != Type::Boolean {
                self.warn(
                    line,
                    format!("non-boolean expression used in {statement} condition"),
                );
            }
        }
    }

    fn lower_if(
        &mut self,
        subroutine: SubroutineDescriptor<'a>,
        condition: &'a Expr<'a>,
        then_block: &'a [Statement<'a>],
        else_block: Option<&'a [Statement<'a>]>,
    ) -> CompileResult<()> {
        let id = self.next_label();
        let if_true = format_compact!("IF_TRUE_{id}");
        let if_false = format_compact!("IF_FALSE_{id}");
        self.check_condition(condition, "if");
        self.lower_expr(condition)?;
        self.emit(Instruction::IfGoto(if_true.clone()));
        self.emit(Instruction::Goto(if_false.clone()));
        self.emit(Instruction::Label(if_true));
        self.lower_statements(subroutine, then_block)?;
        match else_block {
            Some(else_block) => {
                let if_end = format_compact!("IF_END_{id}");
                self.emit(Instruction::Goto(if_end.clone()));
                self.emit(Instruction::Label(if_false));
                self.lower_statements(subroutine, else_block)?;
                self.emit(Instruction::Label(if_end));
            }
            None => self.emit(Instruction::Label(if_false)),
        }
        Ok(())
    }

    fn lower_while(
        &mut self,
        subroutine: SubroutineDescriptor<'a>,
        condition: &'a Expr<'a>,
        body: &'a [Statement<'a>],
    ) -> CompileResult<()> {
        let begin = format_compact!("WHILE_BEGIN_{}", self.next_label());
        let exit = format_compact!("WHILE_EXIT_{}", self.next_label());
        self.check_condition(condition, "while");
        self.emit(Instruction::Label(begin.clone()));
        self.lower_expr(condition)?;
        self.arithmetic(ArithmeticOp::Not);
        self.emit(Instruction::IfGoto(exit.clone()));
        self.lower_statements(subroutine, body)?;
        self.emit(Instruction::Goto(begin));
        self.emit(Instruction::Label(exit));
        Ok(())
    }

    fn lower_return(
        &mut self,
        subroutine: SubroutineDescriptor<'a>,
        value: Option<&'a Expr<'a>>,
        line: u32,
    ) -> CompileResult<()> {
        match (value, subroutine.return_type) {
            (Some(_), Type::Void) => {
                return Err(SemanticError::VoidReturnsValue {
                    subroutine: subroutine.name.into(),
                    line,
                }
                .into());
            }
            (Some(value), _) => self.lower_expr(value)?,
            (None, Type::Void) => self.push(Segment::Constant, 0),
            (None, _) => {
                return Err(SemanticError::MissingReturnValue {
                    subroutine: subroutine.name.into(),
                    line,
                }
                .into());
            }
        }
        self.emit(Instruction::Return);
        Ok(())
    }

    fn resolve(&self, ident: Ident<'a>) -> CompileResult<Symbol<'a>> {
        self.symbols.find_symbol(ident.name).ok_or_else(|| {
            SemanticError::UndefinedVariable {
                name: ident.name.into(),
                line: ident.line,
            }
            .into()
        })
    }

    fn lower_expr(&mut self, expr: &'a Expr<'a>) -> CompileResult<()> {
        match expr {
            Expr::IntegerConstant { value, line } => {
                let value = check_integer(*value, *line)?;
                self.push(Segment::Constant, value);
            }
            Expr::StringConstant(text) => self.lower_string(text)?,
            Expr::KeywordConstant { keyword, line } => match keyword {
                KeywordConstant::True => {
                    self.push(Segment::Constant, 0);
                    self.arithmetic(ArithmeticOp::Not);
                }
                KeywordConstant::False | KeywordConstant::Null => {
                    self.push(Segment::Constant, 0);
                }
                KeywordConstant::This => {
                    if self.subroutine_kind() == Some(SubroutineKind::Function) {
                        return Err(SemanticError::ThisInFunction { line: *line }.into());
                    }
                    self.push(Segment::Pointer, 0);
                }
            },
            Expr::Var(ident) => {
                let symbol = self.resolve(*ident)?;
                self.push(symbol.storage.segment(), symbol.index);
            }
            Expr::Subscript { name, index } => {
                let symbol = self.resolve(*name)?;
                self.push(symbol.storage.segment(), symbol.index);
                self.lower_expr(index)?;
                self.arithmetic(ArithmeticOp::Add);
                self.pop(Segment::Pointer, 1);
                self.push(Segment::That, 0);
            }
            Expr::Unary { op, operand } => {
                self.lower_expr(operand)?;
                self.arithmetic(match op {
                    UnaryOp::Neg => ArithmeticOp::Neg,
                    UnaryOp::Not => ArithmeticOp::Not,
                });
            }
            Expr::Binary { op, lhs, rhs } => {
                self.check_operands(*op, lhs, rhs);
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)?;
                match op {
                    BinaryOp::Add => self.arithmetic(ArithmeticOp::Add),
                    BinaryOp::Sub => self.arithmetic(ArithmeticOp::Sub),
                    BinaryOp::Mul => self.call("Math.multiply".into(), 2),
                    BinaryOp::Div => self.call("Math.divide".into(), 2),
                    BinaryOp::And => self.arithmetic(ArithmeticOp::And),
                    BinaryOp::Or => self.arithmetic(ArithmeticOp::Or),
                    BinaryOp::Lt => self.arithmetic(ArithmeticOp::Lt),
                    BinaryOp::Gt => self.arithmetic(ArithmeticOp::Gt),
                    BinaryOp::Eq => self.arithmetic(ArithmeticOp::Eq),
                }
            }
            Expr::Call(call) => self.lower_call(call)?,
        }
        Ok(())
    }

    /// Builds a `String` object one character at a time.
    fn lower_string(&mut self, text: &str) -> CompileResult<()> {
        let len = u32::try_from(text.len()).unwrap_or(u32::MAX);
        let len = check_integer(len, self.line)?;
        self.push(Segment::Constant, len);
        self.call("String.new".into(), 1);
        for byte in text.bytes() {
            self.push(Segment::Constant, u16::from(byte));
            self.call("String.appendChar".into(), 2);
        }
        Ok(())
    }

    fn lower_call(&mut self, call: &'a SubroutineCall<'a>) -> CompileResult<()> {
        let name = call.name;
        let (target, implicit_args) = match call.receiver {
            None => {
                // `this` is bound in methods and, after allocation, in constructors.
                if self.subroutine_kind() == Some(SubroutineKind::Function) {
                    return Err(SemanticError::MethodCallOutsideMethod {
                        name: name.name.into(),
                        line: name.line,
                    }
                    .into());
                }
                self.push(Segment::Pointer, 0);
                (format_compact!("{}.{}", self.class.name, name.name), 1)
            }
            Some(receiver) => match self.symbols.find_symbol(receiver.name) {
                Some(symbol) => {
                    let Type::Class(class_name) = symbol.symbol_type else {
                        return Err(SemanticError::CallOnPrimitive {
                            name: receiver.name.into(),
                            var_type: format_compact!("{}", symbol.symbol_type),
                            line: receiver.line,
                        }
                        .into());
                    };
                    self.push(symbol.storage.segment(), symbol.index);
                    (format_compact!("{class_name}.{}", name.name), 1)
                }
                None => (format_compact!("{}.{}", receiver.name, name.name), 0),
            },
        };
        for arg in call.args {
            self.lower_expr(arg)?;
        }
        self.call(target, call.args.len() + implicit_args);
        Ok(())
    }

    fn check_operands(&mut self, op: BinaryOp, lhs: &'a Expr<'a>, rhs: &'a Expr<'a>) {
        let lhs_type = self.expr_type(lhs);
        let rhs_type = self.expr_type(rhs);
        let any_boolean = lhs_type == Some(Type::Boolean) || rhs_type == Some(Type::Boolean);
        let line = line_of(lhs).or_else(|| line_of(rhs)).unwrap_or(self.line);
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div if any_boolean => {
                self.warn(line, "arithmetic operation with boolean operand".into());
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Eq if any_boolean => {
                self.warn(line, "comparison operation with boolean operand".into());
            }
            BinaryOp::And | BinaryOp::Or => {
                if let (Some(l), Some(r)) = (lhs_type, rhs_type) {
                    if is_primitive(l) && is_primitive(r) && l != r {
                        self.warn(
                            line,
                            format!("mixed types '{l}' and '{r}' in '{}' operation", op.as_text()),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// Infers the type of an expression where it is obvious without looking at calls or arrays.
    fn expr_type(&self, expr: &Expr<'a>) -> Option<Type<'a>> {
        match expr {
            Expr::IntegerConstant { .. } => Some(Type::Int),
            Expr::StringConstant(_) => Some(Type::Class("String")),
            Expr::KeywordConstant { keyword, .. } => match keyword {
                KeywordConstant::True | KeywordConstant::False => Some(Type::Boolean),
                KeywordConstant::Null => None,
                KeywordConstant::This => Some(Type::Class(self.class.name)),
            },
            Expr::Var(ident) => self.symbols.find_symbol(ident.name).map(|s| s.symbol_type),
            Expr::Unary {
                op: UnaryOp::Neg, ..
            } => Some(Type::Int),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.expr_type(operand),
            Expr::Binary { op, lhs, .. } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => Some(Type::Int),
                BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Eq => Some(Type::Boolean),
                BinaryOp::And | BinaryOp::Or => self.expr_type(lhs),
            },
            Expr::Subscript { .. } | Expr::Call(_) => None,
        }
    }
}

fn is_primitive(t: Type) -> bool {
    matches!(t, Type::Int | Type::Char | Type::Boolean)
}

fn check_integer(value: u32, line: u32) -> CompileResult<u16> {
    if value > MAX_INTEGER_CONSTANT {
        return Err(SemanticError::IntegerOutOfRange { value, line }.into());
    }
    Ok(value as u16)
}

/// Returns the first line number found in `expr`.
fn line_of(expr: &Expr) -> Option<u32> {
    match expr {
        Expr::IntegerConstant { line, .. } | Expr::KeywordConstant { line, .. } => Some(*line),
        Expr::StringConstant(_) => None,
        Expr::Var(ident) | Expr::Subscript { name: ident, .. } => Some(ident.line),
        Expr::Unary { operand, .. } => line_of(operand),
        Expr::Binary { lhs, rhs, .. } => line_of(lhs).or_else(|| line_of(rhs)),
        Expr::Call(call) => Some(call.receiver.unwrap_or(call.name).line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{
        error::{CompileError, ErrorKind},
        options::PrecedenceMode,
        parser::parse_class,
    };
    use bumpalo::Bump;

    fn lower_with(source: &str, precedence: PrecedenceMode) -> CompileResult<LoweredClass> {
        let arena = Bump::new();
        let class = parse_class(source, &arena, precedence)?;
        lower_class(class)
    }

    fn lower(source: &str) -> CompileResult<LoweredClass> {
        lower_with(source, PrecedenceMode::Flat)
    }

    fn vm(source: &str) -> String {
        lower(source).unwrap().render(OutputLayout::LeftJustified)
    }

    fn semantic_err(source: &str) -> SemanticError {
        match lower(source) {
            Err(CompileError::Semantic(err)) => err,
            other => panic!("expected semantic error, got {other:?}"),
        }
    }

    fn warnings(source: &str) -> Vec<String> {
        lower(source)
            .unwrap()
            .warnings
            .into_iter()
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn nested_call_with_arithmetic() {
        assert_eq!(
            vm("class Main { function void main() { do Output.printInt(1 + (2 * 3)); return; } }"),
            "function Main.main 0
push constant 1
push constant 2
push constant 3
call Math.multiply 2
add
call Output.printInt 1
pop temp 0
push constant 0
return
"
        );
    }

    #[test]
    fn method_binds_this_first() {
        assert_eq!(
            vm("class P { field int x; method int getX() { return x; } }"),
            "function P.getX 0
push argument 0
pop pointer 0
push this 0
return
"
        );
    }

    #[test]
    fn constructor_allocates_fields() {
        assert_eq!(
            vm("class P {
                  field int x, y;
                  static int count;
                  constructor P new(int ax) { let x = ax; let count = count + 1; return this; }
                }"),
            "function P.new 0
push constant 2
call Memory.alloc 1
pop pointer 0
push argument 0
pop this 0
push static 0
push constant 1
add
pop static 0
push pointer 0
return
"
        );
    }

    #[test]
    fn integer_range_is_checked() {
        assert!(lower("class A { function int f() { return 32767; } }").is_ok());
        assert_eq!(
            semantic_err("class A { function int f() {\n return 32768; } }"),
            SemanticError::IntegerOutOfRange {
                value: 32768,
                line: 2
            }
        );
        assert_eq!(
            semantic_err("class A { function int f() { return -99999999999; } }"),
            SemanticError::IntegerOutOfRange {
                value: u32::MAX,
                line: 1
            }
        );
    }

    #[test]
    fn flat_expression_lowers_left_to_right() {
        assert_eq!(
            vm("class A { function void f() { var int x; let x = 1 + 2 - 3 * 5 / 6 & 7 | 8; return; } }"),
            "function A.f 1
push constant 1
push constant 2
add
push constant 3
sub
push constant 5
call Math.multiply 2
push constant 6
call Math.divide 2
push constant 7
and
push constant 8
or
pop local 0
push constant 0
return
"
        );
    }

    #[test]
    fn conventional_precedence_regroups_but_keeps_operand_order() {
        let lowered = lower_with(
            "class A { function int f() { return 1 + 2 * 3; } }",
            PrecedenceMode::Conventional,
        )
        .unwrap();
        assert_eq!(
            lowered.render(OutputLayout::LeftJustified),
            "function A.f 0
push constant 1
push constant 2
push constant 3
call Math.multiply 2
add
return
"
        );
    }

    #[test]
    fn locals_shadow_fields() {
        assert_eq!(
            vm("class A { field int x; method void f() { var int x; let x = 1; return; } }"),
            "function A.f 1
push argument 0
pop pointer 0
push constant 1
pop local 0
push constant 0
return
"
        );
    }

    #[test]
    fn fields_are_invisible_in_functions() {
        assert_eq!(
            semantic_err("class A { field int x; function void f() { let x = 1; return; } }"),
            SemanticError::UndefinedVariable {
                name: "x".into(),
                line: 1
            }
        );
    }

    #[test]
    fn undefined_variable_is_rejected() {
        assert_eq!(
            semantic_err("class A { function int f() {\n\n return y; } }"),
            SemanticError::UndefinedVariable {
                name: "y".into(),
                line: 3
            }
        );
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        assert_eq!(
            semantic_err("class A { field int x; static boolean x; }"),
            SemanticError::DuplicateSymbol {
                name: "x".into(),
                line: 1
            }
        );
        assert!(matches!(
            semantic_err("class A { function void f(int a) { var int a; return; } }"),
            SemanticError::DuplicateSymbol { .. }
        ));
        // The same name in different scopes is fine.
        assert!(lower("class A { field int a; method void f(int a) { return; } }").is_ok());
    }

    #[test]
    fn void_variables_are_rejected() {
        assert!(matches!(
            semantic_err("class A { field void x; }"),
            SemanticError::VoidVariable { .. }
        ));
        assert!(matches!(
            semantic_err("class A { function void f(void a) { return; } }"),
            SemanticError::VoidVariable { .. }
        ));
        assert!(matches!(
            semantic_err("class A { function void f() { var void a; return; } }"),
            SemanticError::VoidVariable { .. }
        ));
    }

    #[test]
    fn return_types_are_checked() {
        assert_eq!(
            semantic_err("class A { function void f() { return 1; } }"),
            SemanticError::VoidReturnsValue {
                subroutine: "f".into(),
                line: 1
            }
        );
        assert_eq!(
            semantic_err("class A { function int f() { if (true) { return; } return 1; } }"),
            SemanticError::MissingReturnValue {
                subroutine: "f".into(),
                line: 1
            }
        );
        assert_eq!(
            semantic_err("class A { constructor B new() { return this; } }"),
            SemanticError::ConstructorReturnType {
                subroutine: "new".into(),
                expected: "A".into(),
                found: "B".into(),
                line: 1
            }
        );
        assert!(matches!(
            semantic_err("class A { constructor void new() { return; } }"),
            SemanticError::ConstructorReturnType { .. }
        ));
    }

    #[test]
    fn nested_returns_use_enclosing_subroutine() {
        assert_eq!(
            vm("class A {
                  function int f(boolean b) {
                    while (b) { if (b) { return 7; } }
                    return 0;
                  }
                  function void g() { return; }
                }"),
            "function A.f 0
label WHILE_BEGIN_0
push argument 0
not
if-goto WHILE_EXIT_1
push argument 0
if-goto IF_TRUE_2
goto IF_FALSE_2
label IF_TRUE_2
push constant 7
return
label IF_FALSE_2
goto WHILE_BEGIN_0
label WHILE_EXIT_1
push constant 0
return
function A.g 0
push constant 0
return
"
        );
        assert_eq!(
            semantic_err(
                "class A {\n function int f() { return 1; }\n function void g() {\n while (true) { return 2; }\n return;\n }\n}"
            ),
            SemanticError::VoidReturnsValue {
                subroutine: "g".into(),
                line: 4
            }
        );
    }

    #[test]
    fn array_assignment_with_subscripts_on_both_sides() {
        assert_eq!(
            vm("class A { function void f(Array a, Array b) { let a[1] = b[2]; return; } }"),
            "function A.f 0
push argument 1
push constant 2
add
pop pointer 1
push that 0
push constant 1
push argument 0
add
pop pointer 1
pop that 0
push constant 0
return
"
        );
    }

    #[test]
    fn calls_are_bound() {
        assert_eq!(
            vm("class Game {
                  field Ball ball;
                  method void run() { do draw(); do ball.move(3); return; }
                  method void draw() { return; }
                  function void main() { var Game g; let g = Game.new(); do g.run(); return; }
                }"),
            "function Game.run 0
push argument 0
pop pointer 0
push pointer 0
call Game.draw 1
pop temp 0
push this 0
push constant 3
call Ball.move 2
pop temp 0
push constant 0
return
function Game.draw 0
push argument 0
pop pointer 0
push constant 0
return
function Game.main 1
call Game.new 0
pop local 0
push local 0
call Game.run 1
pop temp 0
push constant 0
return
"
        );
    }

    #[test]
    fn local_call_in_constructor_uses_new_object() {
        let out = vm("class A { constructor A new() { do init(); return this; } method void init() { return; } }");
        assert!(out.contains("pop pointer 0\npush pointer 0\ncall A.init 1\npop temp 0\n"));
    }

    #[test]
    fn local_call_in_function_is_rejected() {
        assert_eq!(
            semantic_err("class A { function void f() { do g(); return; } }"),
            SemanticError::MethodCallOutsideMethod {
                name: "g".into(),
                line: 1
            }
        );
    }

    #[test]
    fn this_in_function_is_rejected() {
        assert_eq!(
            semantic_err("class A { function A f() { return this; } }"),
            SemanticError::ThisInFunction { line: 1 }
        );
    }

    #[test]
    fn call_on_primitive_is_rejected() {
        assert_eq!(
            semantic_err("class A { function void f(int n) { do n.go(); return; } }"),
            SemanticError::CallOnPrimitive {
                name: "n".into(),
                var_type: "int".into(),
                line: 1
            }
        );
    }

    #[test]
    fn constants_are_lowered() {
        assert_eq!(
            vm("class A { function void f() { var boolean b; var A a; let b = true; let b = false; let a = null; do Output.printString(\"Hi\"); return; } }"),
            "function A.f 2
push constant 0
not
pop local 0
push constant 0
pop local 0
push constant 0
pop local 1
push constant 2
call String.new 1
push constant 72
call String.appendChar 2
push constant 105
call String.appendChar 2
call Output.printString 1
pop temp 0
push constant 0
return
"
        );
    }

    #[test]
    fn control_flow_uses_class_wide_labels() {
        assert_eq!(
            vm("class A {
                  function void f(int n) { while (n > 0) { let n = n - 1; } return; }
                  method void g(boolean c) { if (c) { do h(); } else { return; } if (~c) { } return; }
                  method void h() { return; }
                }")
            .replace("\n", " | "),
            [
                "function A.f 0",
                "label WHILE_BEGIN_0",
                "push argument 0",
                "push constant 0",
                "gt",
                "not",
                "if-goto WHILE_EXIT_1",
                "push argument 0",
                "push constant 1",
                "sub",
                "pop argument 0",
                "goto WHILE_BEGIN_0",
                "label WHILE_EXIT_1",
                "push constant 0",
                "return",
                "function A.g 0",
                "push argument 0",
                "pop pointer 0",
                "push argument 1",
                "if-goto IF_TRUE_2",
                "goto IF_FALSE_2",
                "label IF_TRUE_2",
                "push pointer 0",
                "call A.h 1",
                "pop temp 0",
                "goto IF_END_2",
                "label IF_FALSE_2",
                "push constant 0",
                "return",
                "label IF_END_2",
                "push argument 1",
                "not",
                "if-goto IF_TRUE_3",
                "goto IF_FALSE_3",
                "label IF_TRUE_3",
                "label IF_FALSE_3",
                "push constant 0",
                "return",
                "function A.h 0",
                "push argument 0",
                "pop pointer 0",
                "push constant 0",
                "return",
                "",
            ]
            .join(" | ")
        );
    }

    #[test]
    fn warnings_are_collected() {
        assert_eq!(
            warnings("class A { function void f(int i, boolean b, char c) {
                var int x;
                let x = i + b;
                let b = i < b;
                let b = b & c;
                let b = 1;
                let x = true;
                if (i) { }
                while (x + 1) { }
                return;
            } }"),
            vec![
                "arithmetic operation with boolean operand",
                "comparison operation with boolean operand",
                "mixed types 'boolean' and 'char' in '&' operation",
                "implicit conversion from int to boolean assigning 'b'",
                "implicit conversion from boolean to int assigning 'x'",
                "non-boolean expression used in if condition",
                "non-boolean expression used in while condition",
            ]
        );
    }

    #[test]
    fn unknown_types_do_not_warn() {
        assert!(
            warnings("class A { function void f(Array a) { var int x; let x = a[0] + Math.abs(x); if (a[1]) { } return; } }")
                .is_empty()
        );
    }

    #[test]
    fn missing_return_is_a_warning() {
        let lowered = lower("class A {\n function void f() {\n } }").unwrap();
        assert_eq!(
            lowered.warnings,
            vec![Warning {
                line: 2,
                message: "subroutine 'f' has no return statement".into()
            }]
        );
        assert_eq!(lowered.instructions.len(), 1);
    }

    #[test]
    fn errors_have_semantic_kind() {
        let err = lower("class A { function void f() { return x; } }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }
}
