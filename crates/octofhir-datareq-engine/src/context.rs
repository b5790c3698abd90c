//! Traversal state
//!
//! The frame stack holds one frame per child result not yet consumed by its
//! parent. Query scopes record the aliases each enclosing query introduces.

use crate::error::{DataRequirementsError, DataRequirementsResult};
use crate::frame::Frame;

/// Mutable state of one expression traversal
#[derive(Debug, Default)]
pub struct TraversalContext {
    stack: Vec<Frame>,
    scopes: Vec<Vec<String>>,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    // === Frame stack ===

    pub fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    pub fn pop(&mut self) -> DataRequirementsResult<Frame> {
        self.stack
            .pop()
            .ok_or(DataRequirementsError::StackUnderflow {
                needed: 1,
                available: 0,
            })
    }

    /// Pop the top `count` frames, returned in push order
    pub fn pop_n(&mut self, count: usize) -> DataRequirementsResult<Vec<Frame>> {
        let available = self.stack.len();
        if count > available {
            return Err(DataRequirementsError::StackUnderflow {
                needed: count,
                available,
            });
        }
        Ok(self.stack.split_off(available - count))
    }

    pub fn peek_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    pub fn height(&self) -> usize {
        self.stack.len()
    }

    /// Pop the resolved frame of a named expression. The stack must hold
    /// exactly that frame.
    pub fn finish_expression(&mut self, name: &str) -> DataRequirementsResult<Frame> {
        if self.stack.len() != 1 {
            return Err(DataRequirementsError::UnresolvedStack {
                name: name.to_string(),
                height: self.stack.len(),
            });
        }
        self.pop()
    }

    // === Query scopes ===

    pub fn enter_query(&mut self, aliases: Vec<String>) {
        self.scopes.push(aliases);
    }

    pub fn exit_query(&mut self) -> DataRequirementsResult<Vec<String>> {
        self.scopes
            .pop()
            .ok_or(DataRequirementsError::NegativeQueryDepth)
    }

    pub fn query_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn in_query(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// Whether `name` is an alias introduced by any enclosing query
    pub fn is_enclosing_alias(&self, name: &str) -> bool {
        self.scopes.iter().flatten().any(|alias| alias == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::DataRequirement;

    #[test]
    fn test_pop_n_keeps_push_order() {
        let mut ctx = TraversalContext::new();
        ctx.push(Frame::single(DataRequirement::of_type("A")));
        ctx.push(Frame::single(DataRequirement::of_type("B")));
        ctx.push(Frame::empty());

        let frames = ctx.pop_n(2).unwrap();
        assert_eq!(frames[0], Frame::single(DataRequirement::of_type("B")));
        assert!(frames[1].is_empty());
        assert_eq!(ctx.height(), 1);

        assert_eq!(
            ctx.pop_n(2).unwrap_err(),
            DataRequirementsError::StackUnderflow {
                needed: 2,
                available: 1
            }
        );
    }

    #[test]
    fn test_query_depth_never_negative() {
        let mut ctx = TraversalContext::new();
        ctx.enter_query(vec!["O".into()]);
        ctx.enter_query(vec!["I".into()]);
        assert_eq!(ctx.query_depth(), 2);
        assert!(ctx.is_enclosing_alias("O"));

        ctx.exit_query().unwrap();
        ctx.exit_query().unwrap();
        assert!(!ctx.in_query());
        assert_eq!(
            ctx.exit_query().unwrap_err(),
            DataRequirementsError::NegativeQueryDepth
        );
    }

    #[test]
    fn test_finish_expression_requires_height_one() {
        let mut ctx = TraversalContext::new();
        assert!(matches!(
            ctx.finish_expression("Empty"),
            Err(DataRequirementsError::UnresolvedStack { height: 0, .. })
        ));

        ctx.push(Frame::empty());
        ctx.push(Frame::empty());
        assert!(matches!(
            ctx.finish_expression("Leftover"),
            Err(DataRequirementsError::UnresolvedStack { height: 2, .. })
        ));

        ctx.pop().unwrap();
        assert!(ctx.finish_expression("Done").unwrap().is_empty());
        assert_eq!(ctx.height(), 0);
    }
}
