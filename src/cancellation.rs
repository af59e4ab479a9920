use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Stop request shared between the controller and one reading pass.
///
/// Every pass gets a fresh flag; raising it makes the pass exit at its next
/// span boundary instead of advancing to the following page.
#[derive(Clone, Debug, Default)]
pub struct StopFlag {
    raised: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::StopFlag;

    #[test]
    fn raising_is_visible_to_clones() {
        let flag = StopFlag::new();
        let pass_copy = flag.clone();
        assert!(!pass_copy.is_raised());
        flag.raise();
        assert!(pass_copy.is_raised());
    }

    #[test]
    fn fresh_flags_are_independent() {
        let old = StopFlag::new();
        old.raise();
        let new = StopFlag::new();
        assert!(!new.is_raised());
    }
}
