use once_cell::sync::Lazy;
use tokio::task::JoinHandle;

pub static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime")
});

pub fn spawn_async<F>(fut: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    RUNTIME.spawn(fut)
}

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_scheme_once() {
        assert_eq!(normalize_url(" api.hubapi.com "), "https://api.hubapi.com");
        assert_eq!(normalize_url("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn spawned_work_runs_on_shared_runtime() {
        let handle = spawn_async(async { 40 + 2 });
        assert_eq!(RUNTIME.block_on(handle).unwrap(), 42);
    }
}
