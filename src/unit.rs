//! Host-neutral model of a loadable code unit
//!
//! A `CodeUnit` is what the host loader hands to transformers: an owning type
//! and its methods. Method bodies are a flat list of [`Op`]s, enough to express
//! the entry-point insertion performed by [`crate::rewrite::EntryRewriter`] and
//! to execute an instrumented method against a [`Recorder`].

use crate::bridge::Recorder;
use crate::probe::ProbeId;

/// A single operation in a method body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Call the native recorder with a probe id
    Record(ProbeId),
    /// Call another method; observable as part of the execution trace
    Invoke(String),
    /// Leave the method
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub signature: String,
    pub body: Vec<Op>,
}

impl Method {
    pub fn new(signature: impl Into<String>, body: Vec<Op>) -> Self {
        Self {
            signature: signature.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    pub owner: String,
    pub methods: Vec<Method>,
}

impl CodeUnit {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn method(&self, signature: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.signature == signature)
    }

    pub fn method_mut(&mut self, signature: &str) -> Option<&mut Method> {
        self.methods.iter_mut().find(|m| m.signature == signature)
    }

    /// Execute one method, forwarding `Record` ops to the recorder
    ///
    /// Returns the invoked targets in order, or `None` if the method does not
    /// exist. Execution stops at the first `Return`.
    pub fn execute(&self, signature: &str, recorder: &dyn Recorder) -> Option<Vec<String>> {
        let method = self.method(signature)?;
        let mut trace = Vec::new();
        for op in &method.body {
            match op {
                Op::Record(id) => recorder.record(*id),
                Op::Invoke(target) => trace.push(target.clone()),
                Op::Return => break,
            }
        }
        Some(trace)
    }
}
