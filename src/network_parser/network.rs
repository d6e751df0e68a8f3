//! HTTP 传输层：阻塞式 reqwest 客户端，带超时、退避重试与轻量抖动。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::base_system::context::Config;

/// 远端读取能力：JSON 或二进制。
pub trait Transport {
    fn get_json(&self, url: &str) -> Result<Value>;
    fn get_bytes(&self, url: &str, headers: &[(HeaderName, String)]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub user_agent: String,
}

impl NetworkConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            request_timeout: cfg.request_timeout(),
            max_retries: cfg.max_retries,
            user_agent: cfg.user_agent.clone(),
        }
    }
}

pub struct RanobeLibNetwork {
    client: Client,
    config: NetworkConfig,
}

impl RanobeLibNetwork {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        // 未启用 gzip 解码，要求服务端返回原始字节
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        default_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn send_with_retry(&self, url: &str, headers: HeaderMap) -> Result<reqwest::blocking::Response> {
        let attempts = self.config.max_retries + 1;
        let mut backoff = 0.6f64;
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(url, attempt, "GET");
            match self
                .client
                .get(url)
                .headers(headers.clone())
                .send()
                .and_then(|r| r.error_for_status())
            {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    // 4xx（429 除外）重试无意义
                    let retryable = e
                        .status()
                        .map(|s| s.is_server_error() || s.as_u16() == 429)
                        .unwrap_or(true);
                    warn!(url, attempt, error = %e, "请求失败");
                    last_error = Some(e);
                    if !retryable || attempt == attempts {
                        break;
                    }
                    sleep_backoff(&mut backoff);
                }
            }
        }

        Err(match last_error {
            Some(e) => anyhow!(e).context(format!("GET {url}")),
            None => anyhow!("GET {url}: no attempt made"),
        })
    }
}

impl Transport for RanobeLibNetwork {
    fn get_json(&self, url: &str) -> Result<Value> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        let resp = self.send_with_retry(url, headers)?;
        let value: Value = resp.json()?;
        Ok(value)
    }

    fn get_bytes(&self, url: &str, extra: &[(HeaderName, String)]) -> Result<Vec<u8>> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        for (name, value) in extra {
            headers.insert(name.clone(), HeaderValue::from_str(value)?);
        }
        let resp = self.send_with_retry(url, headers)?;
        Ok(resp.bytes()?.to_vec())
    }
}

fn sleep_backoff(backoff: &mut f64) {
    let sleep_s = (*backoff + jitter_seconds(0.3)).min(3.0);
    std::thread::sleep(Duration::from_millis((sleep_s * 1000.0) as u64));
    *backoff = (*backoff * 2.0).min(3.0);
}

/// `[0, 1)` 区间的抖动系数，用时间戳生成，不引入 rand 依赖。
pub(crate) fn jitter_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    (nanos % 10_000) as f64 / 10_000.0
}

fn jitter_seconds(max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    jitter_fraction() * max
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::REFERER;
    use std::sync::mpsc;
    use std::thread;

    fn spawn_stub(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, mpsc::Receiver<Vec<(String, String)>>, thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base_url = format!("http://{}", server.server_addr());
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            for (status, body) in responses {
                let Ok(request) = server.recv() else {
                    return;
                };
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string().to_ascii_lowercase(), h.value.to_string()))
                    .collect();
                let _ = tx.send(headers);
                let _ = request
                    .respond(tiny_http::Response::from_string(body).with_status_code(status));
            }
        });

        (base_url, rx, handle)
    }

    fn network(max_retries: u32) -> RanobeLibNetwork {
        RanobeLibNetwork::new(NetworkConfig {
            request_timeout: Duration::from_secs(5),
            max_retries,
            user_agent: "test-agent".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn get_json_decodes_body() {
        let (base, rx, handle) = spawn_stub(vec![(200, r#"{"data":[{"id":1}]}"#)]);
        let v = network(0).get_json(&format!("{base}/manga/1/chapters")).unwrap();
        assert_eq!(v["data"][0]["id"], 1);

        let headers = rx.recv().unwrap();
        assert!(headers.contains(&("user-agent".to_string(), "test-agent".to_string())));
        handle.join().unwrap();
    }

    #[test]
    fn retries_server_errors() {
        let (base, _rx, handle) = spawn_stub(vec![(503, "busy"), (200, r#"{"ok":true}"#)]);
        let v = network(1).get_json(&format!("{base}/x")).unwrap();
        assert_eq!(v["ok"], true);
        handle.join().unwrap();
    }

    #[test]
    fn client_errors_are_not_retried() {
        // 若 404 被重试，第二次请求会拿到 200 并成功
        let (base, rx, handle) = spawn_stub(vec![(404, "nope"), (200, r#"{"ok":true}"#)]);
        let err = network(3).get_json(&format!("{base}/missing")).unwrap_err();
        assert!(err.to_string().contains("GET"));
        assert_eq!(rx.try_iter().count(), 1);

        // 消费剩余的响应，让桩服务线程退出
        let value = network(0).get_json(&format!("{base}/after")).unwrap();
        assert_eq!(value["ok"], true);
        handle.join().unwrap();
    }

    #[test]
    fn get_bytes_sends_extra_headers() {
        let (base, rx, handle) = spawn_stub(vec![(200, "IMG")]);
        let bytes = network(0)
            .get_bytes(
                &format!("{base}/cover.jpg"),
                &[(REFERER, "https://ranobelib.me/".to_string())],
            )
            .unwrap();
        assert_eq!(bytes, b"IMG");
        let headers = rx.recv().unwrap();
        assert!(headers.contains(&("referer".to_string(), "https://ranobelib.me/".to_string())));
        handle.join().unwrap();
    }

    #[test]
    fn jitter_stays_in_unit_interval() {
        let j = jitter_fraction();
        assert!((0.0..1.0).contains(&j));
    }
}
