//! Code-unit rewriting
//!
//! The rewriter is the second phase of instrumentation: it is only called for
//! units whose call site already matched. `EntryRewriter` inserts a single
//! `Record` at method entry and leaves the rest of the body untouched.

use crate::error::TransformError;
use crate::probe::{CallSite, ProbeId};
use crate::unit::{CodeUnit, Op};

/// Produces an instrumented copy of a code unit
pub trait Rewriter: Send + Sync {
    fn rewrite(
        &self,
        unit: &CodeUnit,
        call_site: &CallSite,
        id: ProbeId,
    ) -> Result<CodeUnit, TransformError>;
}

/// Records the probe id on entry to the target method
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryRewriter;

impl Rewriter for EntryRewriter {
    fn rewrite(
        &self,
        unit: &CodeUnit,
        call_site: &CallSite,
        id: ProbeId,
    ) -> Result<CodeUnit, TransformError> {
        let mut rewritten = unit.clone();
        let method = rewritten
            .method_mut(&call_site.signature)
            .ok_or_else(|| TransformError::MethodNotFound(call_site.clone()))?;

        verify(&method.body, call_site)?;
        method.body.insert(0, Op::Record(id));
        Ok(rewritten)
    }
}

/// A body must be non-empty and end in a `Return`
fn verify(body: &[Op], call_site: &CallSite) -> Result<(), TransformError> {
    match body.last() {
        None => Err(TransformError::Malformed {
            call_site: call_site.clone(),
            reason: "empty method body".to_string(),
        }),
        Some(Op::Return) => Ok(()),
        Some(_) => Err(TransformError::Malformed {
            call_site: call_site.clone(),
            reason: "method body does not end in a return".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Method;

    fn site() -> CallSite {
        CallSite::new("OrderRouter", "send(Order)")
    }

    fn router(body: Vec<Op>) -> CodeUnit {
        CodeUnit::new("OrderRouter")
            .with_method(Method::new("send(Order)", body))
            .with_method(Method::new("cancel(Order)", vec![Op::Return]))
    }

    #[test]
    fn test_inserts_record_at_entry() {
        let unit = router(vec![Op::Invoke("route".into()), Op::Return]);
        let rewritten = EntryRewriter.rewrite(&unit, &site(), ProbeId::new(7)).unwrap();

        assert_eq!(
            rewritten.method("send(Order)").unwrap().body,
            vec![
                Op::Record(ProbeId::new(7)),
                Op::Invoke("route".into()),
                Op::Return
            ]
        );
        // Other methods and the input are untouched
        assert_eq!(rewritten.method("cancel(Order)").unwrap().body, vec![Op::Return]);
        assert_eq!(unit.method("send(Order)").unwrap().body.len(), 2);
    }

    #[test]
    fn test_missing_method() {
        let unit = CodeUnit::new("OrderRouter");
        let err = EntryRewriter.rewrite(&unit, &site(), ProbeId::new(7)).unwrap_err();
        assert_eq!(err, TransformError::MethodNotFound(site()));
    }

    #[test]
    fn test_empty_body_is_malformed() {
        let err = EntryRewriter
            .rewrite(&router(Vec::new()), &site(), ProbeId::new(7))
            .unwrap_err();
        assert!(matches!(err, TransformError::Malformed { .. }));
    }

    #[test]
    fn test_body_without_return_is_malformed() {
        let err = EntryRewriter
            .rewrite(&router(vec![Op::Invoke("route".into())]), &site(), ProbeId::new(7))
            .unwrap_err();
        match err {
            TransformError::Malformed { call_site, reason } => {
                assert_eq!(call_site, site());
                assert!(reason.contains("return"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
