//! Step-completion observers.
//!
//! The engine reports progress by invoking an observer after each terminal
//! step transition (success, failure, or skip), in topological order, before
//! the next step begins. Streaming surfaces subscribe through this hook;
//! the engine itself never waits on a consumer.

use tokio::sync::mpsc;
use trellis_core::run::StepResult;

/// Trait for receiving step-completion notifications.
///
/// `on_step_complete` receives an immutable snapshot of the just-terminated
/// step result. Implementations must tolerate partial run state: earlier
/// steps are terminal, later ones are still pending.
pub trait RunObserver: Send + Sync {
    /// Called after a step reaches SUCCESS, FAILED, or SKIPPED.
    fn on_step_complete(&self, result: &StepResult);
}

/// An observer that discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_step_complete(&self, _result: &StepResult) {}
}

/// An observer that forwards step results to an unbounded channel.
///
/// The channel is unbounded so a slow consumer never blocks the run; the
/// volume is one message per step. Send errors (receiver dropped) are
/// ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<StepResult>,
}

impl ChannelObserver {
    /// Create a channel observer along with its receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepResult>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl RunObserver for ChannelObserver {
    fn on_step_complete(&self, result: &StepResult) {
        let _ = self.sender.send(result.clone());
    }
}

/// Adapter turning a closure into an observer.
#[derive(Debug, Clone)]
pub struct FnObserver<F>(pub F);

impl<F> RunObserver for FnObserver<F>
where
    F: Fn(&StepResult) + Send + Sync,
{
    fn on_step_complete(&self, result: &StepResult) {
        (self.0)(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::run::StepStatus;

    #[test]
    fn channel_observer_forwards_results() {
        let (observer, mut receiver) = ChannelObserver::new();
        let mut result = StepResult::pending("step_1");
        result.status = StepStatus::Success;
        observer.on_step_complete(&result);

        let received = receiver.try_recv().unwrap();
        assert_eq!(received.step_id, "step_1");
        assert_eq!(received.status, StepStatus::Success);
    }

    #[test]
    fn dropped_receiver_is_tolerated() {
        let (observer, receiver) = ChannelObserver::new();
        drop(receiver);
        observer.on_step_complete(&StepResult::pending("s"));
    }

    #[test]
    fn closures_adapt_into_observers() {
        let count = std::sync::atomic::AtomicUsize::new(0);
        let observer = FnObserver(|_result: &StepResult| {
            count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        observer.on_step_complete(&StepResult::pending("s"));
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
