/// How binary operators group when an expression mixes them.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PrecedenceMode {
    /// Every binary operator has the same precedence and groups left to right, so `1 + 2 * 3`
    /// is `(1 + 2) * 3`.
    #[default]
    Flat,
    /// Multiplicative operators bind tighter than additive ones, then comparisons, `=`, `&` and
    /// finally `|`.
    Conventional,
}

/// How VM instructions are laid out when rendered to text.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputLayout {
    #[default]
    LeftJustified,
    /// Indent every instruction except `function`, `label` and `if-goto` by four spaces.
    Indented,
}

/// Settings that apply to every compilation unit of a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub precedence: PrecedenceMode,
    pub layout: OutputLayout,
}
