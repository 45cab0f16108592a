// Hand-off of the push token to the application backend.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub token: String,
    pub device_id: String,
    pub platform: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend answered {0}")]
    Status(u16),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Run `attempt` until it succeeds or `max_attempts` is reached, sleeping a
/// fixed delay between tries. Returns the value and the attempt it took.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut attempt: F,
) -> Result<(T, u32), RegistrationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max = policy.max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt(n).await {
            Ok(value) => return Ok((value, n)),
            Err(e) if n >= max => {
                return Err(RegistrationError::Exhausted {
                    attempts: n,
                    last: e.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(attempt = n, max, %e, "push: backend registration attempt failed");
            }
        }
        tokio::time::sleep(policy.delay).await;
        n += 1;
    }
}

/// POST the registration; non-2xx answers count as failures.
pub async fn register_push_token(
    client: &reqwest::Client,
    url: &str,
    request: &RegistrationRequest,
    policy: RetryPolicy,
) -> Result<u32, RegistrationError> {
    let (_, attempts) = with_retry(policy, move |_| async move {
        let resp = client.post(url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RegistrationError::Status(status.as_u16()));
        }
        Ok(())
    })
    .await?;
    Ok(attempts)
}
