use std::{
    error::Error,
    path::{Path, PathBuf},
};

use clap::{ArgAction, Parser, ValueEnum};
use jack_frontend::{
    CompileOptions, OutputLayout, PrecedenceMode,
    compiler::{compile, dump_ast, dump_tokens},
};
use log::{LevelFilter, debug, error, info};
use simple_logger::SimpleLogger;

/// Compiles Jack classes to VM code.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// A `.jack` file or a directory containing `.jack` files.
    pub input: PathBuf,
    /// How binary operators without parentheses are grouped.
    #[arg(value_enum, long, default_value_t = Precedence::Flat)]
    pub precedence: Precedence,
    /// What to produce for each class.
    #[arg(value_enum, long, default_value_t = Emit::Vm)]
    pub emit: Emit,
    /// Indent instructions other than `function`, `label` and `if-goto`.
    #[arg(long)]
    pub indent: bool,
    /// Print VM code instead of writing a `.vm` file next to each source.
    #[arg(long)]
    pub stdout: bool,
    /// Log more. May be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Default, Debug, ValueEnum)]
pub enum Precedence {
    /// Strictly left to right.
    #[default]
    Flat,
    /// Multiplication before addition before comparison.
    Conventional,
}

#[derive(Copy, Clone, PartialEq, Default, Debug, ValueEnum)]
pub enum Emit {
    #[default]
    Vm,
    /// Dump the tokens of each class.
    Tokens,
    /// Dump the syntax tree of each class.
    Ast,
}

impl From<Precedence> for PrecedenceMode {
    fn from(value: Precedence) -> Self {
        match value {
            Precedence::Flat => PrecedenceMode::Flat,
            Precedence::Conventional => PrecedenceMode::Conventional,
        }
    }
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn settings(&self) -> Settings {
        Settings {
            options: CompileOptions {
                precedence: self.precedence.into(),
                layout: if self.indent {
                    OutputLayout::Indented
                } else {
                    OutputLayout::LeftJustified
                },
            },
            emit: self.emit,
            stdout: self.stdout,
        }
    }
}

/// Everything needed to process one compilation unit.
#[derive(Copy, Clone, Debug)]
struct Settings {
    options: CompileOptions,
    emit: Emit,
    stdout: bool,
}

#[derive(Debug)]
/// Represents an input path that can not be compiled.
pub enum InputError {
    NotJackFile(PathBuf),
    NotFound(PathBuf),
    Io(PathBuf, std::io::Error),
}

impl Error for InputError {}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::NotJackFile(path) => {
                write!(f, "{} is not a .jack file", path.display())
            }
            InputError::NotFound(path) => {
                write!(f, "{} is neither a file nor a directory", path.display())
            }
            InputError::Io(path, err) => write!(f, "{}: {err}", path.display()),
        }
    }
}

fn is_jack_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jack")
}

/// Returns the files to compile. A directory yields its `.jack` files in sorted order.
fn compilation_units(input: &Path) -> Result<Vec<PathBuf>, InputError> {
    if input.is_file() {
        if !is_jack_file(input) {
            return Err(InputError::NotJackFile(input.to_path_buf()));
        }
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(InputError::NotFound(input.to_path_buf()));
    }
    let entries =
        std::fs::read_dir(input).map_err(|err| InputError::Io(input.to_path_buf(), err))?;
    let mut units = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| InputError::Io(input.to_path_buf(), err))?
            .path();
        if path.is_file() && is_jack_file(&path) {
            units.push(path);
        }
    }
    units.sort();
    Ok(units)
}

/// The file VM code for `source` is written to.
fn output_path(source: &Path) -> PathBuf {
    source.with_extension("vm")
}

/// Compiles one file. Nothing is written if compilation fails.
fn compile_unit(path: &Path, settings: &Settings) -> Result<(), Box<dyn Error>> {
    debug!("Compiling {}.", path.display());
    let source = std::fs::read_to_string(path)?;
    match settings.emit {
        Emit::Tokens => println!("{}", dump_tokens(&source)),
        Emit::Ast => {
            let ast = dump_ast(&source, settings.options.precedence)
                .map_err(|err| err.with_context(&source).to_string())?;
            println!("{ast}");
        }
        Emit::Vm => {
            let lowered = compile(&source, &settings.options)
                .map_err(|err| err.with_context(&source).to_string())?;
            let vm = lowered.render(settings.options.layout);
            if settings.stdout {
                print!("{vm}");
            } else {
                let out = output_path(path);
                std::fs::write(&out, vm)?;
                info!(
                    "Compiled class {} to {}.",
                    lowered.name,
                    out.display()
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    SimpleLogger::new()
        .without_timestamps()
        .with_level(args.log_level())
        .init()?;
    let settings = args.settings();
    let units = compilation_units(&args.input)?;
    let mut failed = 0;
    for unit in units.iter() {
        if let Err(err) = compile_unit(unit, &settings) {
            error!("{}: {err}", unit.display());
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(format!("{failed} of {} classes failed to compile", units.len()).into());
    }
    Ok(())
}
