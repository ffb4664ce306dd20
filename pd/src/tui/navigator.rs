//! View stack
//!
//! Exactly one view is active: the top of the stack. The root view can
//! never be popped.

use tracing::debug;

use super::views::View;

#[derive(Debug)]
pub struct Navigator {
    stack: Vec<View>,
}

impl Navigator {
    pub fn new(root: View) -> Self {
        Self { stack: vec![root] }
    }

    pub fn active(&self) -> &View {
        // len >= 1 always holds
        &self.stack[self.stack.len() - 1]
    }

    pub fn active_mut(&mut self) -> &mut View {
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    /// Append and activate
    pub fn push(&mut self, view: View) {
        debug!(view = view.id(), depth = self.stack.len() + 1, "Navigator::push: called");
        self.stack.push(view);
    }

    /// Swap the active view in place; the depth is unchanged
    pub fn replace(&mut self, view: View) {
        debug!(view = view.id(), "Navigator::replace: called");
        *self.active_mut() = view;
    }

    /// Remove the active view; a no-op on the root
    pub fn pop(&mut self) -> Option<View> {
        if self.stack.len() == 1 {
            debug!("Navigator::pop: at root, ignored");
            return None;
        }
        let view = self.stack.pop();
        debug!(depth = self.stack.len(), "Navigator::pop: called");
        view
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_root(&self) -> bool {
        self.stack.len() == 1
    }

    pub fn views(&self) -> &[View] {
        &self.stack
    }

    pub fn views_mut(&mut self) -> &mut [View] {
        &mut self.stack
    }
}
