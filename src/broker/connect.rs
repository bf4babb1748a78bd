use std::future::Future;

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::ConnectSettings;
use crate::utils::error::{BrokerError, ConnectionError};

/// Runs `attempt` until it succeeds or the policy's attempts are used up.
///
/// Each attempt is cut off after `policy.timeout`; failed attempts are
/// followed by `policy.delay`, except the last one. An attempt count of zero
/// still tries once.
pub async fn connect_with_retry<T, F, Fut>(
    addr: &str,
    policy: &ConnectSettings,
    mut attempt: F,
) -> Result<T, ConnectionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let max_attempts = policy.attempts.max(1);
    let mut current = 1;

    loop {
        let outcome = match timeout(policy.timeout, attempt()).await {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Timeout(policy.timeout)),
        };

        match outcome {
            Ok(conn) => return Ok(conn),
            Err(err) => {
                warn!(
                    addr = %addr,
                    "Connection attempt {}/{} failed: {}",
                    current, max_attempts, err
                );

                if current >= max_attempts {
                    return Err(ConnectionError::Exhausted {
                        addr: addr.to_string(),
                        attempts: max_attempts,
                        last: err,
                    });
                }

                sleep(policy.delay).await;
                current += 1;
            }
        }
    }
}
