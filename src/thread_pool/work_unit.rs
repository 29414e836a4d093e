/// Unit of work executed by a [`WorkDispatcher`](super::WorkDispatcher).
///
/// A unit is immutable once built and runs exactly once per dispatch, on
/// whichever worker claims it.
pub trait WorkUnit: Send + Sync {
    fn execute(&self);

    /// Short name used in logs
    fn label(&self) -> &'static str {
        "work-unit"
    }
}

/// Adapter turning a closure into a [`WorkUnit`]
pub struct FnWorkUnit<F> {
    label: &'static str,
    task: F,
}

impl<F> WorkUnit for FnWorkUnit<F>
where
    F: Fn() + Send + Sync,
{
    fn execute(&self) {
        (self.task)()
    }

    fn label(&self) -> &'static str {
        self.label
    }
}

/// Box a closure as a work unit
pub fn work_unit<F>(label: &'static str, task: F) -> Box<dyn WorkUnit>
where
    F: Fn() + Send + Sync + 'static,
{
    Box::new(FnWorkUnit { label, task })
}
