use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use pollwatch::PollError;
use pollwatch::Pollable;
use pollwatch::Source;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::Span;

const WAIT: Duration = Duration::from_secs(10);

/// Returns `values` increasing timestamps, then transient errors, then the
/// terminal signal once `close_after` polls have been made.
struct TestSourceInput {
    call_count: u32,
    values: u32,
    close_after: u32,
    base: i64,
}

impl TestSourceInput {
    fn new(
        values: u32,
        close_after: u32,
    ) -> Self {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_millis() as i64;
        Self {
            call_count: 0,
            values,
            close_after,
            base,
        }
    }
}

#[async_trait]
impl Pollable<i64> for TestSourceInput {
    async fn poll(&mut self) -> Result<i64, PollError> {
        if self.call_count >= self.close_after {
            return Err(PollError::SourceClosed);
        }
        self.call_count += 1;
        sleep(Duration::from_millis(1)).await;
        if self.call_count <= self.values {
            return Ok(self.base + self.call_count as i64);
        }
        Err(PollError::Transient("mock error".to_string()))
    }
}

/// Runs `watch_num` consumers against a source; consumer `i` closes its
/// own watch after observing `i + 2` wakes unless the source ends first.
async fn run_source(
    input: TestSourceInput,
    watch_num: usize,
) -> Option<i64> {
    let source = Arc::new(Source::new(input, Span::current()));

    let mut consumers = Vec::new();
    for i in 0..watch_num {
        let (_, mut watch) = source.watch().expect("source is running");
        consumers.push(tokio::spawn(async move {
            let mut last: Option<i64> = None;
            let mut count = 0;
            while watch.changed().await {
                let value = watch.get();
                if let Some(prev) = last {
                    assert!(value.expect("woken after an update") >= prev);
                }
                last = value;
                if count > i {
                    watch.close();
                }
                count += 1;
            }
        }));
    }

    let closer = {
        let source = source.clone();
        tokio::spawn(async move {
            while !source.is_closed() {
                sleep(Duration::from_millis(1)).await;
            }
            assert!(source.watch().is_err());
            let value = source.get();

            assert!(source.close().is_ok());
            assert!(source.is_closed());
            assert_eq!(source.get(), value);
            value
        })
    };

    for consumer in consumers {
        timeout(WAIT, consumer)
            .await
            .expect("consumer should finish")
            .expect("consumer assertions hold");
    }
    let value = timeout(WAIT, closer)
        .await
        .expect("source should close")
        .expect("closer assertions hold");

    source.join().await;
    assert_eq!(source.get(), value);
    value
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_source_terminates_after_values_errors_and_signal() {
    // 20 values, 5 transient errors, terminal signal on the 26th poll
    let input = TestSourceInput::new(20, 25);
    let base = input.base;

    let last = run_source(input, 30).await;

    assert_eq!(last, Some(base + 20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_source_variations() {
    for (values, close_after, watch_num) in [
        (30, 25, 20),
        (22, 18, 20),
        (15, 10, 20),
        (28, 30, 20),
        (19, 21, 20),
        (13, 15, 20),
        (18, 22, 10),
        (14, 12, 15),
    ] {
        let input = TestSourceInput::new(values, close_after);
        let base = input.base;

        let last = run_source(input, watch_num).await;

        assert_eq!(last, Some(base + values.min(close_after) as i64));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_value_is_the_final_successful_poll() {
    let input = TestSourceInput::new(20, 25);
    let base = input.base;
    let source = Source::new(input, Span::current());

    timeout(WAIT, source.join()).await.expect("source should end");

    assert!(source.is_closed());
    assert_eq!(source.get(), Some(base + 20));
    assert_eq!(source.version(), 20);
    assert!(source.watch().is_err());

    sleep(Duration::from_millis(10)).await;
    assert_eq!(source.get(), Some(base + 20));
}
