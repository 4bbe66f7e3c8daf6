//! A small ECMAScript interpreter whose blocks accept guarded
//! `catch (e) when (cond) { }` clauses and a trailing `finally`.

pub mod ast;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod types;

pub use config::Config;
pub use error::Error;
pub use interpreter::{Completion, Interpreter};
pub use types::JsValue;

/// Parses and runs `source` in a fresh interpreter.
pub fn run_source(source: &str, config: &Config) -> Result<JsValue, Error> {
    Interpreter::new(config.clone()).eval_source(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_source_reports_each_outcome() {
        let config = Config::default();
        assert!(matches!(run_source("1 + 2", &config), Ok(JsValue::Number(n)) if n == 3.0));
        assert!(matches!(run_source("1 +;", &config), Err(Error::Parse(_))));
        match run_source("{ throw new TypeError('t'); } catch (e) when (false) { }", &config) {
            Err(e) => assert_eq!(e.to_string(), "Uncaught TypeError: t"),
            Ok(v) => panic!("expected a throw, got {v}"),
        }
    }
}
