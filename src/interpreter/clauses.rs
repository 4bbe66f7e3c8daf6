use super::*;

impl Interpreter {
    /// Runs `body` under the clauses attached to a block.
    ///
    /// A throw is offered to each `catch` clause in source order: the binding
    /// is made in a fresh scope, the guard is evaluated there, and the first
    /// clause whose guard is absent or truthy handles it. When no clause
    /// matches the original value keeps propagating. `finally` always runs
    /// afterwards, and its own abrupt completion replaces the pending one.
    pub(crate) fn exec_guarded(
        &mut self,
        handlers: &Handlers,
        env: &EnvRef,
        body: impl FnOnce(&mut Self) -> Completion,
    ) -> Completion {
        let mut result = body(self);

        if let Completion::Throw(thrown) = &result
            && !handlers.catches.is_empty()
        {
            result = self.match_catch_clauses(&handlers.catches, thrown.clone(), env);
        }

        if let Some(finalizer) = &handlers.finalizer {
            let fin = self.exec_block_node(finalizer, env);
            if fin.is_abrupt() {
                return fin;
            }
        }
        result
    }

    fn match_catch_clauses(
        &mut self,
        catches: &[CatchClause],
        thrown: JsValue,
        env: &EnvRef,
    ) -> Completion {
        for clause in catches {
            let catch_env = Environment::new(Some(env.clone()));
            if let Some(param) = &clause.param
                && let Err(e) = self.bind_pattern(param, thrown.clone(), BindingKind::Let, &catch_env)
            {
                return Completion::Throw(e);
            }
            if let Some(guard) = &clause.guard {
                let accepted = match self.eval_expr(guard, &catch_env) {
                    Completion::Normal(v) => to_boolean(&v),
                    other => return other,
                };
                if !accepted {
                    continue;
                }
            }
            return self.exec_block_node(&clause.body, &catch_env);
        }
        Completion::Throw(thrown)
    }

    /// A braced body in its own lexical scope, under its clauses.
    pub(crate) fn exec_block_node(&mut self, block: &BlockNode, env: &EnvRef) -> Completion {
        if block.handlers.is_empty() {
            let block_env = Environment::new(Some(env.clone()));
            return self.exec_statements(&block.body, &block_env);
        }
        self.exec_guarded(&block.handlers, env, |interp| {
            let block_env = Environment::new(Some(env.clone()));
            interp.exec_statements(&block.body, &block_env)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Result<JsValue, crate::Error>, Vec<String>) {
        let mut interp = Interpreter::new(Config::default());
        let result = interp.eval_source(src);
        (result, interp.console_output().to_vec())
    }

    #[test]
    fn unmatched_throw_keeps_its_identity() {
        let (result, out) = run(
            "var original = { tag: 1 }; var seen;
             try {
                 { throw original; } catch (e) when (false) { }
             } catch (e) { seen = e; }
             console.log(seen === original);",
        );
        assert!(result.is_ok());
        assert_eq!(out, vec!["true"]);
    }

    #[test]
    fn guard_sees_the_binding_but_not_the_block() {
        let (_, out) = run(
            "let x = 'outer';
             { let x = 'inner'; throw 5; } catch (e) when (e === 5 && x === 'outer') { console.log('ok'); }",
        );
        assert_eq!(out, vec!["ok"]);
    }

    #[test]
    fn throwing_guard_replaces_the_original() {
        let (result, out) = run(
            "try {
                 { throw 1; } catch (e) when (e.missing.deep) { console.log('no'); } catch { console.log('no'); }
             } catch (err) { console.log(err instanceof TypeError); }",
        );
        assert!(result.is_ok());
        assert_eq!(out, vec!["true"]);
    }

    #[test]
    fn finally_completion_overrides() {
        let (_, out) = run(
            "function f() { return 1; } finally { return 2; }
             function g() { throw 1; } catch (e) when (false) { } finally { return 'g'; }
             console.log(f(), g());",
        );
        assert_eq!(out, vec!["2 g"]);
    }

    #[test]
    fn guards_after_the_match_do_not_run() {
        let (_, out) = run(
            "let log = [];
             { throw 3; }
             catch (e) when (log.push('a'), e === 3) { log.push('body'); }
             catch (e) when (log.push('b')) { }
             console.log(log.join());",
        );
        assert_eq!(out, vec!["a,body"]);
    }
}
