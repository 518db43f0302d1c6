use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use super::{CAN_EXECUTE, Command, Parameter, downcast_parameter, take_parameter};
use crate::core::observable::PropertyChanged;

type Action<P> = dyn Fn(P) + Send + Sync;
type Eligibility<P> = dyn Fn(&P) -> bool + Send + Sync;

/// Synchronous command backed by a closure.
///
/// Unlike [`AsyncCommand`](super::AsyncCommand) it has no running state, so
/// the owner decides when eligibility may have changed and calls
/// [`raise_can_execute_changed`](Self::raise_can_execute_changed).
pub struct DelegateCommand<P> {
    name: String,
    action: Box<Action<P>>,
    eligibility: Option<Box<Eligibility<P>>>,
    properties: PropertyChanged,
}

impl<P> DelegateCommand<P> {
    pub fn new(name: impl Into<String>, action: impl Fn(P) + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
            eligibility: None,
            properties: PropertyChanged::new(),
        }
    }

    #[must_use]
    pub fn with_can_execute(mut self, predicate: impl Fn(&P) -> bool + Send + Sync + 'static) -> Self {
        self.eligibility = Some(Box::new(predicate));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn properties(&self) -> &PropertyChanged {
        &self.properties
    }

    pub fn can_execute(&self, parameter: &P) -> bool {
        self.eligibility
            .as_ref()
            .is_none_or(|eligible| eligible(parameter))
    }

    /// Run the action if the command is executable. Returns whether it ran.
    pub fn execute(&self, parameter: P) -> bool {
        if !self.can_execute(&parameter) {
            debug!(command = %self.name, "Command is not executable, ignoring");
            return false;
        }
        (self.action)(parameter);
        true
    }

    /// Tell observers to re-check [`can_execute`](Self::can_execute).
    pub fn raise_can_execute_changed(&self) {
        self.properties.notify(CAN_EXECUTE);
    }
}

impl<P> fmt::Debug for DelegateCommand<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateCommand")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<P> Command for DelegateCommand<P>
where
    P: Default + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn can_execute(&self, parameter: Option<&(dyn Any + Send)>) -> bool {
        match downcast_parameter::<P>(parameter) {
            Some(Some(parameter)) => Self::can_execute(self, parameter),
            Some(None) => Self::can_execute(self, &P::default()),
            None => false,
        }
    }

    async fn execute(&self, parameter: Parameter) -> color_eyre::Result<()> {
        if let Ok(parameter) = take_parameter::<P>(parameter) {
            Self::execute(self, parameter);
        } else {
            debug!(command = %self.name, "Parameter has the wrong type, ignoring");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_execute_respects_predicate() {
        let allowed = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::clone(&allowed);
        let counter = Arc::clone(&calls);
        let command = DelegateCommand::new("clear", move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .with_can_execute(move |_| gate.load(Ordering::SeqCst));

        assert!(!command.execute(()));
        allowed.store(true, Ordering::SeqCst);
        assert!(command.execute(()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_raise_can_execute_changed() {
        let command = DelegateCommand::new("noop", |()| {});
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        command
            .properties()
            .subscribe_all(move |name| sink.lock().unwrap().push(name.to_string()));

        command.raise_can_execute_changed();

        assert_eq!(*seen.lock().unwrap(), vec![CAN_EXECUTE]);
    }

    #[tokio::test]
    async fn test_erased_execute_with_wrong_type_is_ignored() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let command = DelegateCommand::new("push", move |value: u32| {
            sink.lock().unwrap().push(value);
        });
        let erased: &dyn Command = &command;

        assert!(!erased.can_execute(Some(&"seven")));
        erased.execute(Some(Box::new("seven"))).await.unwrap();
        erased.execute(Some(Box::new(7_u32))).await.unwrap();
        erased.execute(None).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![7, 0]);
    }
}
