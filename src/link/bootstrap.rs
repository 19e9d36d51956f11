/*!
 * Service bring-up and authentication handshake
 */

use dp2_core_interface::{Alive, Credentials, PipelineApi};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

/// Environment variable the service launcher reads its JVM options from
pub const JAVA_OPTS: &str = "JAVA_OPTS";

/// Options appended to `JAVA_OPTS` for a locally started service
pub const STARTUP_JAVA_OPTS: &str = "-Dgosh.args=--noi";

/// Make sure the service is live and return its liveness report
///
/// When the service does not answer and `config.starting` is set, a local
/// instance is launched first. Nothing is returned on failure, so callers
/// never see a half-filled session.
pub async fn bring_up(api: &dyn PipelineApi, config: &LinkConfig) -> Result<Alive> {
    match check_alive(api, config.call_timeout()).await {
        Ok(alive) => Ok(alive),
        Err(LinkError::Connectivity(reason)) if config.starting => {
            info!(
                url = %config.url(),
                reason = %reason,
                "Pipeline not reachable, starting a local instance"
            );
            start_local_service(api, config).await
        }
        Err(e) => Err(e),
    }
}

/// One liveness query bounded by `timeout`
async fn check_alive(api: &dyn PipelineApi, timeout: Duration) -> Result<Alive> {
    match tokio::time::timeout(timeout, api.alive()).await {
        Ok(alive) => alive.map_err(LinkError::from),
        Err(_) => Err(LinkError::Connectivity(format!(
            "no liveness answer within {:?}",
            timeout
        ))),
    }
}

/// Launch the service from the configured exec line and wait until it answers
///
/// Fails with `LinkError::Startup` when the program cannot be spawned, exits
/// with a failure status before answering, or is still silent after
/// `ws_timeup` seconds. A launcher that exits successfully is assumed to have
/// forked the service, and readiness polling goes on until the deadline. A
/// service that came up keeps running after the link is gone.
pub async fn start_local_service(api: &dyn PipelineApi, config: &LinkConfig) -> Result<Alive> {
    let current_opts = std::env::var(JAVA_OPTS).unwrap_or_default();
    let mut child = spawn_service(config.exec_line(), &current_opts)?;
    let deadline = Instant::now() + config.startup_deadline();
    let poll = config.startup_poll_interval();
    let mut launcher_done = false;

    loop {
        if !launcher_done {
            if let Some(status) = child.try_wait()? {
                if !status.success() {
                    return Err(LinkError::Startup(format!(
                        "service exited with {} before becoming ready",
                        status
                    )));
                }
                debug!("Launcher exited cleanly, waiting for the service");
                launcher_done = true;
            }
        }

        match check_alive(api, config.call_timeout()).await {
            Ok(alive) => {
                info!(version = %alive.version, "Local pipeline is up");
                return Ok(alive);
            }
            Err(LinkError::Connectivity(reason)) => {
                debug!(reason = %reason, "Local pipeline not ready yet");
            }
            Err(e) => return Err(e),
        }

        if Instant::now() >= deadline {
            if !launcher_done {
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "Could not stop the unresponsive service");
                }
            }
            return Err(LinkError::Startup(format!(
                "service did not come up within {} seconds",
                config.ws_timeup
            )));
        }

        tokio::time::sleep(poll).await;
    }
}

/// Spawn the exec line with `JAVA_OPTS` derived from `current_opts`
fn spawn_service(exec_line: &str, current_opts: &str) -> Result<Child> {
    let mut parts = exec_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| LinkError::Startup("no exec line configured".to_string()))?;

    let java_opts = augment_java_opts(current_opts);
    debug!(program, java_opts = %java_opts, "Spawning pipeline service");

    Command::new(program)
        .args(parts)
        .env(JAVA_OPTS, java_opts)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| LinkError::Startup(format!("cannot launch '{}': {}", program, e)))
}

/// Value of `JAVA_OPTS` for the launched service
///
/// Empty: the startup options alone. Otherwise the current value with any
/// surrounding quotes removed, a space, then the startup options.
pub fn augment_java_opts(current: &str) -> String {
    let current = strip_quotes(current.trim());
    if current.is_empty() {
        STARTUP_JAVA_OPTS.to_string()
    } else {
        format!("{} {}", current, STARTUP_JAVA_OPTS)
    }
}

fn strip_quotes(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|&q| value.strip_prefix(q).and_then(|v| v.strip_suffix(q)))
        .unwrap_or(value)
}

/// Reject a credential pair with exactly one half set
pub fn check_credentials(credentials: &Credentials) -> Result<()> {
    if credentials.is_partial() {
        return Err(LinkError::Authentication(
            "client_key and client_secret must be set together".to_string(),
        ));
    }
    Ok(())
}

/// Handshake with a service that requires authentication
///
/// A complete pair is handed to the client for signing. An empty pair is let
/// through; the service will refuse the protected calls.
pub fn authenticate(api: &dyn PipelineApi, credentials: &Credentials) -> Result<()> {
    check_credentials(credentials)?;
    if credentials.is_empty() {
        warn!("Service requires authentication but no client credentials are configured");
        return Ok(());
    }
    debug!(client_key = %credentials.key, "Installing client credentials");
    api.set_credentials(credentials.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::MockPipeline;

    fn alive(version: &str, local_mode: bool, authentication: bool) -> Alive {
        Alive {
            version: version.to_string(),
            local_mode,
            authentication,
        }
    }

    #[test]
    fn test_java_opts_empty() {
        assert_eq!(augment_java_opts(""), STARTUP_JAVA_OPTS);
        assert_eq!(augment_java_opts("  "), STARTUP_JAVA_OPTS);
        assert_eq!(augment_java_opts("\"\""), STARTUP_JAVA_OPTS);
    }

    #[test]
    fn test_java_opts_appended() {
        assert_eq!(augment_java_opts("-Xmx1G"), "-Xmx1G -Dgosh.args=--noi");
        assert_eq!(
            augment_java_opts("\"-Xmx1G -Dfoo=bar\""),
            "-Xmx1G -Dfoo=bar -Dgosh.args=--noi"
        );
        assert_eq!(augment_java_opts("'-Xmx1G'"), "-Xmx1G -Dgosh.args=--noi");
        // Unbalanced quotes are left alone
        assert_eq!(augment_java_opts("\"-Xmx1G"), "\"-Xmx1G -Dgosh.args=--noi");
    }

    #[test]
    fn test_credential_pairs() {
        for (key, secret, ok) in [
            ("", "", true),
            ("key", "shh", true),
            ("key", "", false),
            ("", "shh", false),
        ] {
            let result = check_credentials(&Credentials::new(key, secret));
            assert_eq!(result.is_ok(), ok, "key={:?} secret={:?}", key, secret);
            if !ok {
                assert!(matches!(result, Err(LinkError::Authentication(_))));
            }
        }
    }

    #[test]
    fn test_authenticate_forwards_complete_pair() {
        let mock = MockPipeline::new();
        authenticate(&mock, &Credentials::new("key", "shh")).unwrap();
        assert_eq!(mock.credentials(), Some(Credentials::new("key", "shh")));
    }

    #[test]
    fn test_authenticate_empty_pair_installs_nothing() {
        let mock = MockPipeline::new();
        authenticate(&mock, &Credentials::default()).unwrap();
        assert_eq!(mock.credentials(), None);

        assert!(authenticate(&mock, &Credentials::new("key", "")).is_err());
        assert_eq!(mock.credentials(), None);
    }

    #[tokio::test]
    async fn test_bring_up_live_service() {
        let mock = MockPipeline::new();
        mock.set_alive(alive("2.0", true, false));

        let report = bring_up(&mock, &LinkConfig::default()).await.unwrap();
        assert_eq!(report, alive("2.0", true, false));
        assert_eq!(mock.calls(), vec!["alive"]);
    }

    #[tokio::test]
    async fn test_bring_up_unreachable_without_starting() {
        let mock = MockPipeline::unreachable();
        let err = bring_up(&mock, &LinkConfig::default()).await.unwrap_err();
        assert!(matches!(err, LinkError::Connectivity(_)));
        assert_eq!(mock.call_count("alive"), 1);
    }

    #[tokio::test]
    async fn test_bad_executable_is_startup_error() {
        let mock = MockPipeline::unreachable();
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "nonexistingprogram --flag".to_string(),
            exec_line_win: "nonexistingprogram.exe --flag".to_string(),
            ..Default::default()
        };

        let err = bring_up(&mock, &config).await.unwrap_err();
        assert!(matches!(err, LinkError::Startup(_)), "unexpected {:?}", err);
    }

    #[tokio::test]
    async fn test_empty_exec_line_is_startup_error() {
        let mock = MockPipeline::unreachable();
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "  ".to_string(),
            exec_line_win: String::new(),
            ..Default::default()
        };

        assert!(matches!(
            bring_up(&mock, &config).await,
            Err(LinkError::Startup(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_service_exiting_early_is_startup_error() {
        let mock = MockPipeline::unreachable();
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "false".to_string(),
            ws_timeup: 10,
            startup_poll_millis: 20,
            ..Default::default()
        };

        let err = bring_up(&mock, &config).await.unwrap_err();
        match err {
            LinkError::Startup(msg) => assert!(msg.contains("exited"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_service_hits_deadline() {
        let mock = MockPipeline::unreachable();
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "sleep 30".to_string(),
            ws_timeup: 0,
            startup_poll_millis: 20,
            ..Default::default()
        };

        let err = bring_up(&mock, &config).await.unwrap_err();
        match err {
            LinkError::Startup(msg) => assert!(msg.contains("did not come up"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    /// Mock that answers once `delay` has passed
    fn comes_up_after(delay: Duration) -> MockPipeline {
        let mock = MockPipeline::unreachable();
        mock.set_alive(alive("2.0", true, false));
        let handle = mock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.set_broken(false);
        });
        mock
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_start_becomes_ready() {
        crate::logging::init_test_logging();
        let mock = comes_up_after(Duration::from_millis(100));
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "sleep 2".to_string(),
            ws_timeup: 5,
            startup_poll_millis: 20,
            ..Default::default()
        };

        let report = bring_up(&mock, &config).await.unwrap();
        assert_eq!(report, alive("2.0", true, false));
        assert!(mock.call_count("alive") >= 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launcher_exiting_cleanly_keeps_waiting() {
        let mock = comes_up_after(Duration::from_millis(100));
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "true".to_string(),
            ws_timeup: 5,
            startup_poll_millis: 20,
            ..Default::default()
        };

        let report = bring_up(&mock, &config).await.unwrap();
        assert_eq!(report.version, "2.0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launcher_exiting_cleanly_still_hits_deadline() {
        let mock = MockPipeline::unreachable();
        let config = LinkConfig {
            starting: true,
            exec_line_nix: "true".to_string(),
            ws_timeup: 0,
            startup_poll_millis: 20,
            ..Default::default()
        };

        let err = bring_up(&mock, &config).await.unwrap_err();
        match err {
            LinkError::Startup(msg) => assert!(msg.contains("did not come up"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_receives_augmented_java_opts() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("pipeline2.sh");
        std::fs::write(
            &script,
            "[ \"$JAVA_OPTS\" = \"-Xmx1G -Dgosh.args=--noi\" ] || exit 3\n",
        )
        .unwrap();

        let exec_line = format!("sh {}", script.display());
        let status = spawn_service(&exec_line, "\"-Xmx1G\"")
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(status.success(), "child saw other JAVA_OPTS: {}", status);

        let status = spawn_service(&exec_line, "-Xmx2G").unwrap().wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
