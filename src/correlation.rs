//! Request correlation id for log lines.
//!
//! The HTTP middleware runs each request inside [`scope`]; blocking workers
//! re-enter the id with [`in_thread`]. [`current`] returns whichever applies,
//! and the ECS log formatter writes it as `trace.id`.
//!
//! ```rust,ignore
//! correlation::scope("req-42".to_string(), async {
//!     assert_eq!(correlation::current().as_deref(), Some("req-42"));
//! })
//! .await;
//! ```

use std::cell::RefCell;
use std::future::Future;

tokio::task_local! {
    static TASK_ID: String;
}

thread_local! {
    static THREAD_ID: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Correlation id of the running request, if any.
pub fn current() -> Option<String> {
    TASK_ID
        .try_with(|id| id.clone())
        .ok()
        .or_else(|| THREAD_ID.with(|id| id.borrow().clone()))
}

/// Run `future` with `id` as its correlation id.
pub async fn scope<F: Future>(id: String, future: F) -> F::Output {
    TASK_ID.scope(id, future).await
}

/// Run `f` on the current thread with `id` as its correlation id.
///
/// The previous id is restored afterwards, also when `f` panics.
pub fn in_thread<R>(id: Option<String>, f: impl FnOnce() -> R) -> R {
    let previous = THREAD_ID.with(|slot| slot.replace(id));
    let _restore = Restore(previous);
    f()
}

struct Restore(Option<String>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        THREAD_ID.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_id_outside_scope() {
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_scope_sets_id() {
        let seen = scope("req-1".to_string(), async { current() }).await;
        assert_eq!(seen.as_deref(), Some("req-1"));
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_id_follows_into_blocking_worker() {
        let seen = scope("req-2".to_string(), async {
            let id = current();
            tokio::task::spawn_blocking(move || in_thread(id, current))
                .await
                .unwrap()
        })
        .await;
        assert_eq!(seen.as_deref(), Some("req-2"));
    }

    #[test]
    fn test_in_thread_restores_previous() {
        in_thread(Some("outer".to_string()), || {
            in_thread(Some("inner".to_string()), || {
                assert_eq!(current().as_deref(), Some("inner"));
            });
            assert_eq!(current().as_deref(), Some("outer"));
        });
        assert_eq!(current(), None);
    }
}
