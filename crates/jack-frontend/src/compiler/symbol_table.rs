use std::collections::HashMap;

use crate::instruction::Segment;

use super::ast::{SubroutineKind, Type};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Lives for the whole class. Holds statics and fields.
    Class,
    /// Lives for one subroutine. Holds arguments and locals.
    Subroutine,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Static,
    Field,
    Argument,
    Local,
}

impl StorageClass {
    const ALL: [StorageClass; 4] = [
        StorageClass::Static,
        StorageClass::Field,
        StorageClass::Argument,
        StorageClass::Local,
    ];

    /// The scope symbols of this storage class belong to.
    pub fn scope(self) -> Scope {
        match self {
            StorageClass::Static | StorageClass::Field => Scope::Class,
            StorageClass::Argument | StorageClass::Local => Scope::Subroutine,
        }
    }

    /// The VM segment that holds variables of this storage class.
    pub fn segment(self) -> Segment {
        match self {
            StorageClass::Static => Segment::Static,
            StorageClass::Field => Segment::This,
            StorageClass::Argument => Segment::Argument,
            StorageClass::Local => Segment::Local,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageClass::Static => "static",
            StorageClass::Field => "field",
            StorageClass::Argument => "argument",
            StorageClass::Local => "local",
        }
    }

    fn counter(self) -> usize {
        self as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Symbol<'a> {
    pub name: &'a str,
    pub symbol_type: Type<'a>,
    pub storage: StorageClass,
    /// The offset of the variable within its segment.
    pub index: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolError {
    /// The name is already defined in the scope.
    Duplicate,
    /// The storage class does not belong to the requested scope.
    WrongScope { storage: StorageClass, scope: Scope },
}

/// Maps names to their storage for the class and subroutine being compiled.
///
/// Lookups check the subroutine scope before the class scope so locals and arguments shadow
/// class variables. Fields are hidden while compiling a function since there is no object to read
/// them from.
#[derive(Debug, Default)]
pub struct SymbolTable<'a> {
    class_scope: HashMap<&'a str, Symbol<'a>>,
    subroutine_scope: HashMap<&'a str, Symbol<'a>>,
    /// The next free index for each storage class.
    counts: [u16; 4],
    hide_fields: bool,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> SymbolTable<'a> {
        SymbolTable::default()
    }

    /// Defines `name` in `scope` at the next free index of `storage`.
    pub fn add_symbol(
        &mut self,
        scope: Scope,
        name: &'a str,
        symbol_type: Type<'a>,
        storage: StorageClass,
    ) -> Result<Symbol<'a>, SymbolError> {
        if storage.scope() != scope {
            return Err(SymbolError::WrongScope { storage, scope });
        }
        let symbols = match scope {
            Scope::Class => &mut self.class_scope,
            Scope::Subroutine => &mut self.subroutine_scope,
        };
        if symbols.contains_key(name) {
            return Err(SymbolError::Duplicate);
        }
        let count = &mut self.counts[storage.counter()];
        let symbol = Symbol {
            name,
            symbol_type,
            storage,
            index: *count,
        };
        *count += 1;
        symbols.insert(name, symbol);
        Ok(symbol)
    }

    /// Returns the symbol `name` refers to from the current subroutine.
    pub fn find_symbol(&self, name: &str) -> Option<Symbol<'a>> {
        if let Some(symbol) = self.subroutine_scope.get(name) {
            return Some(*symbol);
        }
        self.class_scope
            .get(name)
            .filter(|s| !(self.hide_fields && s.storage == StorageClass::Field))
            .copied()
    }

    /// Removes every symbol of `scope` and restarts its indices at 0.
    pub fn reset(&mut self, scope: Scope) {
        match scope {
            Scope::Class => self.class_scope.clear(),
            Scope::Subroutine => self.subroutine_scope.clear(),
        }
        for storage in StorageClass::ALL {
            if storage.scope() == scope {
                self.counts[storage.counter()] = 0;
            }
        }
    }

    /// Prepares the subroutine scope for a new subroutine of `class_name`. Methods receive the
    /// object as an implicit `this` argument at index 0.
    pub fn start_subroutine(&mut self, kind: SubroutineKind, class_name: &'a str) {
        self.reset(Scope::Subroutine);
        self.hide_fields = kind == SubroutineKind::Function;
        if kind == SubroutineKind::Method {
            // The table was just cleared so `this` can not collide.
            let _ = self.add_symbol(
                Scope::Subroutine,
                "this",
                Type::Class(class_name),
                StorageClass::Argument,
            );
        }
    }

    /// The number of symbols defined with `storage`.
    pub fn count(&self, storage: StorageClass) -> u16 {
        self.counts[storage.counter()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense_per_storage_class() {
        let mut table = SymbolTable::new();
        let a = table
            .add_symbol(Scope::Class, "a", Type::Int, StorageClass::Field)
            .unwrap();
        let b = table
            .add_symbol(Scope::Class, "b", Type::Int, StorageClass::Static)
            .unwrap();
        let c = table
            .add_symbol(Scope::Class, "c", Type::Boolean, StorageClass::Field)
            .unwrap();
        assert_eq!((a.index, b.index, c.index), (0, 0, 1));
        assert_eq!(table.count(StorageClass::Field), 2);
        assert_eq!(table.count(StorageClass::Static), 1);
        assert_eq!(table.count(StorageClass::Local), 0);
    }

    #[test]
    fn duplicate_in_same_scope_is_rejected() {
        let mut table = SymbolTable::new();
        table
            .add_symbol(Scope::Class, "x", Type::Int, StorageClass::Field)
            .unwrap();
        assert_eq!(
            table.add_symbol(Scope::Class, "x", Type::Char, StorageClass::Static),
            Err(SymbolError::Duplicate)
        );
        // The failed definition does not consume an index.
        assert_eq!(table.count(StorageClass::Static), 0);
    }

    #[test]
    fn storage_class_must_match_scope() {
        let mut table = SymbolTable::new();
        assert_eq!(
            table.add_symbol(Scope::Class, "x", Type::Int, StorageClass::Local),
            Err(SymbolError::WrongScope {
                storage: StorageClass::Local,
                scope: Scope::Class
            })
        );
    }

    #[test]
    fn subroutine_scope_shadows_class_scope() {
        let mut table = SymbolTable::new();
        table
            .add_symbol(Scope::Class, "x", Type::Int, StorageClass::Field)
            .unwrap();
        table.start_subroutine(SubroutineKind::Method, "A");
        table
            .add_symbol(Scope::Subroutine, "x", Type::Boolean, StorageClass::Local)
            .unwrap();
        let found = table.find_symbol("x").unwrap();
        assert_eq!(found.storage, StorageClass::Local);
        assert_eq!(found.symbol_type, Type::Boolean);

        table.start_subroutine(SubroutineKind::Method, "A");
        assert_eq!(table.find_symbol("x").unwrap().storage, StorageClass::Field);
    }

    #[test]
    fn fields_are_hidden_in_functions() {
        let mut table = SymbolTable::new();
        table
            .add_symbol(Scope::Class, "f", Type::Int, StorageClass::Field)
            .unwrap();
        table
            .add_symbol(Scope::Class, "s", Type::Int, StorageClass::Static)
            .unwrap();
        table.start_subroutine(SubroutineKind::Function, "A");
        assert_eq!(table.find_symbol("f"), None);
        assert!(table.find_symbol("s").is_some());
        table.start_subroutine(SubroutineKind::Constructor, "A");
        assert!(table.find_symbol("f").is_some());
    }

    #[test]
    fn methods_receive_this_as_argument_zero() {
        let mut table = SymbolTable::new();
        table.start_subroutine(SubroutineKind::Method, "Point");
        let arg = table
            .add_symbol(Scope::Subroutine, "dx", Type::Int, StorageClass::Argument)
            .unwrap();
        assert_eq!(arg.index, 1);
        assert_eq!(
            table.find_symbol("this"),
            Some(Symbol {
                name: "this",
                symbol_type: Type::Class("Point"),
                storage: StorageClass::Argument,
                index: 0,
            })
        );

        table.start_subroutine(SubroutineKind::Function, "Point");
        let arg = table
            .add_symbol(Scope::Subroutine, "dx", Type::Int, StorageClass::Argument)
            .unwrap();
        assert_eq!(arg.index, 0);
    }

    #[test]
    fn reset_clears_only_its_scope() {
        let mut table = SymbolTable::new();
        table
            .add_symbol(Scope::Class, "s", Type::Int, StorageClass::Static)
            .unwrap();
        table
            .add_symbol(Scope::Subroutine, "l", Type::Int, StorageClass::Local)
            .unwrap();
        table.reset(Scope::Subroutine);
        assert!(table.find_symbol("l").is_none());
        assert_eq!(table.count(StorageClass::Local), 0);
        assert!(table.find_symbol("s").is_some());
        table.reset(Scope::Class);
        assert!(table.find_symbol("s").is_none());
        assert_eq!(table.count(StorageClass::Static), 0);
    }

    #[test]
    fn storage_classes_map_to_segments() {
        assert_eq!(StorageClass::Static.segment(), Segment::Static);
        assert_eq!(StorageClass::Field.segment(), Segment::This);
        assert_eq!(StorageClass::Argument.segment(), Segment::Argument);
        assert_eq!(StorageClass::Local.segment(), Segment::Local);
    }
}
