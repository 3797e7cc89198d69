//! The environment: a stack of name -> Value scopes.
//!
//! Frame 0 is the global frame and is never popped. `define`/`let` install
//! into the current (topmost) frame and refuse to redefine a name already
//! present in that same frame; shadowing a name in a lower frame is fine.
//!
//! Function calls use `enter_call`, which additionally drops every local
//! frame above the global one before pushing the callee's parameter frame.
//! This is what gives mini-scheme its "dynamic-over-global" scoping: a
//! callee never sees the caller's locals, only globals and its own
//! parameters. The dropped frames are restored by the returned guard on
//! every exit path, including errors, so the pre-call stack depth is always
//! restored.

use std::collections::HashMap;

use crate::error::EvalError;
use crate::value::Value;

pub struct Environment {
    /// frames[0] is the global frame.
    frames: Vec<HashMap<String, Value>>,
    /// Number of function calls currently nested. `enter_call` always resets
    /// `frames` to depth 2 (global + callee), so frame depth alone cannot be
    /// used to detect runaway recursion; this counter tracks it separately.
    call_depth: usize,
}

impl Environment {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
            call_depth: 0,
        }
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    /// Push a new empty frame on top.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Remove the top frame. Popping the global frame is a caller-contract
    /// violation; it is a silent no-op as far as the language is concerned,
    /// but is logged so it can be noticed during development.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        } else {
            log::warn!("attempt to pop the global frame ignored");
        }
    }

    /// Push a frame and return a guard that pops it again on drop, even if
    /// the caller unwinds through a `?`.
    pub fn scoped(&mut self) -> ScopeGuard<'_> {
        self.push();
        ScopeGuard { env: self }
    }

    /// Enter a function call: every frame above the global one is set aside,
    /// `params` becomes the sole local frame, and the guard restores the
    /// caller's frames on drop. This is the mechanism behind
    /// "dynamic-over-global" scoping (see module docs).
    pub fn enter_call(&mut self, params: HashMap<String, Value>) -> CallGuard<'_> {
        let saved = self.frames.split_off(1);
        self.frames.push(params);
        self.call_depth += 1;
        CallGuard { env: self, saved }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&mut self) -> &mut HashMap<String, Value> {
        self.frames.last_mut().expect("global frame always present")
    }

    pub fn global(&self) -> &HashMap<String, Value> {
        &self.frames[0]
    }

    pub fn global_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.frames[0]
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Install `name -> value` into the current frame. Fails if `name` is
    /// already bound in that exact frame; shadowing an outer binding is
    /// allowed.
    pub fn define(&mut self, name: String, value: Value) -> Result<(), EvalError> {
        let frame = self.current();
        if frame.contains_key(&name) {
            return Err(EvalError::Redefinition { name });
        }
        frame.insert(name, value);
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ScopeGuard<'e> {
    env: &'e mut Environment,
}

impl<'e> ScopeGuard<'e> {
    pub fn env(&mut self) -> &mut Environment {
        self.env
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.env.pop();
    }
}

pub struct CallGuard<'e> {
    env: &'e mut Environment,
    saved: Vec<HashMap<String, Value>>,
}

impl<'e> CallGuard<'e> {
    pub fn env(&mut self) -> &mut Environment {
        self.env
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.env.frames.truncate(1);
        self.env.frames.append(&mut self.saved);
        self.env.call_depth -= 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn redefinition_in_same_frame_fails() {
        let mut env = Environment::new();
        env.define("x".into(), Value::Integer(1)).unwrap();
        assert!(env.define("x".into(), Value::Integer(2)).is_err());
    }

    #[test]
    fn shadowing_in_a_deeper_frame_is_allowed_and_restored() {
        let mut env = Environment::new();
        env.define("x".into(), Value::Integer(1)).unwrap();
        {
            let mut guard = env.scoped();
            guard.env().define("x".into(), Value::Integer(2)).unwrap();
            assert_eq!(guard.env().lookup("x"), Some(&Value::Integer(2)));
        }
        assert_eq!(env.lookup("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn call_guard_hides_caller_locals_and_restores_depth_on_error() {
        let mut env = Environment::new();
        env.define("g".into(), Value::Integer(10)).unwrap();
        let depth_before;
        {
            let mut outer = env.scoped();
            outer.env().define("local".into(), Value::Integer(1)).unwrap();
            depth_before = outer.env().depth();

            let mut params = HashMap::new();
            params.insert("p".to_string(), Value::Integer(2));
            {
                let mut call = outer.env().enter_call(params);
                // Caller's local is not visible inside the call.
                assert_eq!(call.env().lookup("local"), None);
                // Globals remain visible.
                assert_eq!(call.env().lookup("g"), Some(&Value::Integer(10)));
                assert_eq!(call.env().lookup("p"), Some(&Value::Integer(2)));
            }
            assert_eq!(outer.env().depth(), depth_before);
            assert_eq!(outer.env().lookup("local"), Some(&Value::Integer(1)));
        }
    }
}
