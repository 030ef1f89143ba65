use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::oneshot;

use crate::application::errors::ApplicationError;

/// Completion handle of a caller waiting for a result.
pub(crate) type Responder<T> = oneshot::Sender<Result<T, ApplicationError>>;

/// Requests waiting for the same in-flight query, grouped by key.
///
/// Only the first waiter of a key issues the underlying call; every waiter
/// receives a clone of the single result.
pub(crate) struct PendingQueries<K, T> {
    waiters: HashMap<K, Vec<Responder<T>>>,
}

impl<K, T> PendingQueries<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            waiters: HashMap::new(),
        }
    }

    /// Returns `true` when the caller must issue the query for `key`.
    pub(crate) fn enqueue(&mut self, key: K, responder: Responder<T>) -> bool {
        let waiters = self.waiters.entry(key).or_default();
        waiters.push(responder);
        waiters.len() == 1
    }

    /// Removes the ledger entry, then hands the result to every waiter.
    pub(crate) fn resolve<Q>(&mut self, key: &Q, result: Result<T, ApplicationError>) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let Some(waiters) = self.waiters.remove(key) else {
            return 0;
        };

        let count = waiters.len();
        for waiter in waiters {
            // The caller may have stopped waiting.
            let _ = waiter.send(result.clone());
        }
        count
    }

    /// Drops every waiter of `key` without an answer.
    pub(crate) fn discard<Q>(&mut self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.waiters.remove(key).map_or(0, |waiters| waiters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_first_waiter_issues_query_and_all_receive_result() {
        let mut queries = PendingQueries::<String, u32>::new();
        let (first, first_receiver) = oneshot::channel();
        let (second, second_receiver) = oneshot::channel();
        let (other, _other_receiver) = oneshot::channel();

        assert!(queries.enqueue("slug".to_string(), first));
        assert!(!queries.enqueue("slug".to_string(), second));
        assert!(queries.enqueue("other".to_string(), other));

        assert_eq!(queries.resolve("slug", Ok(7)), 2);
        assert_eq!(first_receiver.await.unwrap(), Ok(7));
        assert_eq!(second_receiver.await.unwrap(), Ok(7));
        assert_eq!(queries.resolve("slug", Ok(8)), 0);
        assert_eq!(queries.discard("other"), 1);
    }

    #[tokio::test]
    async fn errors_are_cloned_to_every_waiter() {
        let mut queries = PendingQueries::<(), ()>::new();
        let (first, first_receiver) = oneshot::channel();
        let (second, second_receiver) = oneshot::channel();
        queries.enqueue((), first);
        queries.enqueue((), second);

        let error = ApplicationError::remote(420, "FLOOD_WAIT_3");
        queries.resolve(&(), Err(error.clone()));

        assert_eq!(first_receiver.await.unwrap(), Err(error.clone()));
        assert_eq!(second_receiver.await.unwrap(), Err(error));
    }

    #[test]
    fn resolved_key_starts_a_new_query() {
        let mut queries = PendingQueries::<u8, ()>::new();
        let (first, _first_receiver) = oneshot::channel();
        let (second, _second_receiver) = oneshot::channel();

        assert!(queries.enqueue(1, first));
        queries.resolve(&1, Ok(()));
        assert!(queries.enqueue(1, second));
    }

    #[tokio::test]
    async fn discarded_waiters_observe_a_closed_channel() {
        let mut queries = PendingQueries::<u8, ()>::new();
        let (waiter, receiver) = oneshot::channel();
        queries.enqueue(1, waiter);

        assert_eq!(queries.discard(&1), 1);
        assert!(receiver.await.is_err());
    }
}
