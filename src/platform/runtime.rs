use std::future::Future;
use std::time::Duration;

/// Spawns `future` onto the ambient tokio runtime, or onto a shared background
/// runtime when the caller is not inside one.
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    use std::sync::LazyLock;
    use tokio::runtime::{Builder, Handle, Runtime};

    // A current-thread runtime would never be driven from here, so the fallback owns a worker.
    static BACKGROUND_RUNTIME: LazyLock<Option<Runtime>> = LazyLock::new(|| {
        match Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("emulator-state-listen")
            .enable_all()
            .build()
        {
            Ok(runtime) => Some(runtime),
            Err(err) => {
                log::warn!("failed to build background tokio runtime: {err}");
                None
            }
        }
    });

    if let Ok(handle) = Handle::try_current() {
        handle.spawn(future);
    } else if let Some(runtime) = BACKGROUND_RUNTIME.as_ref() {
        let _ = runtime.spawn(future);
    }
}

/// Gives every other ready task on the runtime a chance to run `times` times over.
pub async fn yield_now(times: usize) {
    for _ in 0..times {
        tokio::task::yield_now().await;
    }
}

/// Asynchronously waits for the provided duration.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    tokio::time::sleep(duration).await;
}

/// Whether a task handed to [`spawn_detached`] from here can run while the caller
/// is still executing. Only a current-thread runtime rules that out.
pub fn spawns_in_parallel() -> bool {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(handle) => handle.runtime_flavor() != RuntimeFlavor::CurrentThread,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawns_on_current_runtime() {
        let (sender, receiver) = async_channel::bounded(1);
        spawn_detached(async move {
            let _ = sender.send(7u8).await;
        });
        let value = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn spawns_without_runtime() {
        let (sender, receiver) = async_channel::bounded(1);
        spawn_detached(async move {
            let _ = sender.send(9u8).await;
        });
        assert_eq!(receiver.recv_blocking().unwrap(), 9);
    }

    #[tokio::test]
    async fn current_thread_runtime_is_not_parallel() {
        assert!(!spawns_in_parallel());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn multi_thread_runtime_is_parallel() {
        assert!(spawns_in_parallel());
    }

    #[test]
    fn no_runtime_means_the_background_worker() {
        assert!(spawns_in_parallel());
    }
}
