use clap::Parser;
use jsguard::{Config, Error, Interpreter, JsValue};
use log::{debug, trace};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "jsguard",
    version,
    about = "Run JavaScript with guarded catch clauses on any block"
)]
struct Cli {
    /// JavaScript file to execute
    file: Option<PathBuf>,

    /// Evaluate inline JavaScript
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,

    /// Maximum nesting of function calls before a RangeError is thrown
    #[arg(long, default_value_t = Config::default().max_call_depth)]
    max_call_depth: usize,

    /// Print the completion value of the script
    #[arg(short = 'p', long)]
    print: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            max_call_depth: self.max_call_depth,
            echo_console: true,
        }
    }
}

fn report(err: &Error) {
    eprintln!("{err}");
}

fn execute_code(interp: &mut Interpreter, code: &str, print: bool) -> ExitCode {
    debug!("running {} bytes of source", code.len());
    match interp.eval_source(code) {
        Ok(val) => {
            trace!("{} console lines written", interp.console_line_count());
            if print {
                println!("{}", interp.inspect_value(&val));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            debug!("script stopped: {e}");
            report(&e);
            ExitCode::from(1)
        }
    }
}

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run_repl(interp: &mut Interpreter) -> ExitCode {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!("jsguard v{}", env!("CARGO_PKG_VERSION"));
    println!("Type JavaScript statements. Press Ctrl-D to exit.");

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match interp.eval_source(trimmed) {
                    Ok(JsValue::Undefined) => {}
                    Ok(val) => println!("{}", interp.inspect_value(&val)),
                    Err(e) => report(&e),
                }
            }
            Err(e) => {
                eprintln!("Read error: {e}");
                return ExitCode::from(1);
            }
        }
    }

    println!();
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let mut interp = Interpreter::new(cli.config());

    if let Some(code) = &cli.eval {
        return execute_code(&mut interp, code, cli.print);
    }

    if let Some(path) = &cli.file {
        debug!("loading {}", path.display());
        return match read_file(path) {
            Ok(source) => execute_code(&mut interp, &source, cli.print),
            Err(e) => {
                report(&e);
                ExitCode::from(1)
            }
        };
    }

    run_repl(&mut interp)
}
