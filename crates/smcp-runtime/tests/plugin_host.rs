//! End-to-end tests against real `sh` plugins in temporary directories.

use serde_json::{json, Map, Value};
use smcp_core::{DiscoveryMethod, ExecutionError, ToolCallError};
use smcp_runtime::{DiscoveryConfig, ExecutorConfig, HostConfig, PluginDiscoverer, PluginHost};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const DESCRIBED_PLUGIN: &str = r#"#!/bin/sh
case "$1" in
  --describe)
    cat <<'JSON'
{
  "plugin": {"name": "devops", "version": "1.0.0", "description": "DevOps tools"},
  "commands": [
    {
      "name": "deploy",
      "description": "Deploy an application",
      "annotations": {"readOnlyHint": false, "destructiveHint": true},
      "parameters": [
        {"name": "app-name", "type": "string", "description": "Application", "required": true},
        {"name": "environment", "type": "string", "default": "production"},
        {"name": "replicas", "type": "integer"}
      ]
    },
    {"name": "echo-args", "description": "Print arguments", "annotations": {"readOnlyHint": true}},
    {"name": "fail"},
    {"name": "where"},
    {"name": "nap", "parameters": [{"name": "secs", "type": "number", "required": true}]}
  ]
}
JSON
    ;;
  deploy) shift; echo "deployed $*" ;;
  echo-args) shift; echo "$*" ;;
  fail) echo "deployment exploded" >&2; exit 4 ;;
  where) echo "$(pwd -P) $PYTHONUNBUFFERED $PYTHONIOENCODING" ;;
  nap) sleep "$3"; echo "slept $3" ;;
  *) echo "unknown command: $1" >&2; exit 2 ;;
esac
"#;

const HELP_ONLY_PLUGIN: &str = r#"#!/bin/sh
case "$1" in
  --help)
    printf 'usage: cli.sh <command>\n\nAvailable commands:\n  status    Show status\n  restart   Restart things\n\nExamples:\n  cli.sh status\n'
    ;;
  status) echo "all good" ;;
  *) echo "unrecognized arguments: $1" >&2; exit 2 ;;
esac
"#;

const BROKEN_PLUGIN: &str = "#!/bin/sh\necho 'nothing to see' >&2\nexit 1\n";

fn write_plugin(root: &Path, name: &str, script: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("cli.sh"), script).unwrap();
}

fn plugin_root() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "devops", DESCRIBED_PLUGIN);
    write_plugin(root.path(), "legacy", HELP_ONLY_PLUGIN);
    root
}

fn host_for(root: &Path, exec_timeout: Duration) -> PluginHost {
    PluginHost::new(
        HostConfig::new(root)
            .with_discovery(DiscoveryConfig::new().with_describe_timeout(Duration::from_secs(5)))
            .with_executor(ExecutorConfig::new().with_timeout(exec_timeout)),
    )
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("arguments must be an object"),
    }
}

#[tokio::test]
async fn test_describe_and_help_discovery() {
    let root = plugin_root();
    std::fs::create_dir(root.path().join("not-a-plugin")).unwrap();
    std::fs::write(root.path().join("not-a-plugin").join("README"), "hi").unwrap();
    write_plugin(root.path(), "broken", BROKEN_PLUGIN);

    let registry = PluginDiscoverer::new(DiscoveryConfig::default())
        .discover(root.path())
        .await
        .unwrap();

    assert_eq!(registry.names(), vec!["devops", "legacy"]);

    let devops = registry.get("devops").unwrap();
    assert_eq!(devops.method, DiscoveryMethod::Describe);
    assert_eq!(devops.info.as_ref().unwrap().version.as_deref(), Some("1.0.0"));
    assert_eq!(devops.command("deploy").unwrap().parameters.len(), 3);

    let legacy = registry.get("legacy").unwrap();
    assert_eq!(legacy.method, DiscoveryMethod::HelpText);
    assert_eq!(
        legacy.commands.keys().collect::<Vec<_>>(),
        vec!["restart", "status"]
    );
    assert!(legacy.command("status").unwrap().parameters.is_empty());
}

#[tokio::test]
async fn test_registered_schemas() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_secs(30));
    let report = host.reload().await.unwrap();
    assert_eq!(report.plugins, 2);

    let tools = host.list_tools().await;
    let deploy = tools
        .iter()
        .find(|t| t.qualified_name == "devops.deploy")
        .unwrap();
    let schema = deploy.input_schema.to_value();
    assert_eq!(schema["required"], json!(["app-name"]));
    assert_eq!(schema["properties"]["replicas"]["type"], "integer");
    assert_eq!(schema["properties"]["environment"]["default"], "production");
    assert!(deploy.annotations.destructive_hint);

    let echo = tools
        .iter()
        .find(|t| t.qualified_name == "devops.echo-args")
        .unwrap();
    assert!(echo.annotations.read_only_hint);
    assert!(!echo.annotations.destructive_hint);

    let status = tools
        .iter()
        .find(|t| t.qualified_name == "legacy.status")
        .unwrap();
    assert_eq!(
        status.input_schema.to_value(),
        json!({"type": "object", "properties": {}, "required": []})
    );
    assert!(tools.iter().any(|t| t.qualified_name == "health"));
}

#[tokio::test]
async fn test_call_marshals_flags() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_secs(30));
    host.reload().await.unwrap();

    let output = host
        .call_tool(
            "devops.echo-args",
            args(json!({"name": "x", "force": true, "dry_run": false})),
        )
        .await
        .unwrap();
    assert_eq!(output.text, "--name x --force");

    let output = host
        .call_tool("devops.deploy", args(json!({"app-name": "web", "replicas": 3})))
        .await
        .unwrap();
    assert_eq!(output.text, "deployed --app-name web --replicas 3");

    let output = host.call_tool("legacy.status", Map::new()).await.unwrap();
    assert_eq!(output.text, "all good");
}

#[tokio::test]
async fn test_call_runs_in_plugin_dir_with_python_env() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_secs(30));
    host.reload().await.unwrap();

    let output = host.call_tool("devops.where", Map::new()).await.unwrap();
    let plugin_dir = root.path().join("devops").canonicalize().unwrap();
    assert_eq!(
        output.text,
        format!("{} 1 utf-8", plugin_dir.display())
    );
}

#[tokio::test]
async fn test_nonzero_exit_carries_stderr() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_secs(30));
    host.reload().await.unwrap();

    let err = host.call_tool("devops.fail", Map::new()).await.unwrap_err();
    match err {
        ToolCallError::Execution(ref e @ ExecutionError::Failed { .. }) => {
            assert_eq!(e.exit_code(), Some(4));
            assert_eq!(e.to_string(), "deployment exploded");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let snap = host.metrics().snapshot();
    assert_eq!(snap.tool_calls_total, 1);
    assert_eq!(snap.tool_calls_error, 1);
}

#[tokio::test]
async fn test_timeout_kills_plugin() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_millis(300));
    host.reload().await.unwrap();

    let started = Instant::now();
    let err = host
        .call_tool("devops.nap", args(json!({"secs": 5})))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3));
    match err {
        ToolCallError::Execution(e) => assert!(e.is_timeout()),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_calls_finish_in_duration_order() {
    let root = plugin_root();
    let host = Arc::new(host_for(root.path(), Duration::from_secs(30)));
    host.reload().await.unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut handles = Vec::new();
    for secs in [1.2, 0.1] {
        let host = Arc::clone(&host);
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let output = host
                .call_tool("devops.nap", args(json!({"secs": secs})))
                .await
                .unwrap();
            tx.send(output.text).unwrap();
        }));
    }
    drop(tx);
    for handle in handles {
        handle.await.unwrap();
    }

    let mut finished = Vec::new();
    while let Some(text) = rx.recv().await {
        finished.push(text);
    }
    assert_eq!(finished, vec!["slept 0.1", "slept 1.2"]);
}

#[tokio::test]
async fn test_reload_drops_removed_plugins() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_secs(30));
    host.reload().await.unwrap();
    assert!(host
        .list_tools()
        .await
        .iter()
        .any(|t| t.qualified_name == "legacy.status"));

    std::fs::remove_dir_all(root.path().join("legacy")).unwrap();
    let report = host.reload().await.unwrap();
    assert_eq!(report.plugins, 1);

    let names: Vec<_> = host
        .list_tools()
        .await
        .into_iter()
        .map(|t| t.qualified_name)
        .collect();
    assert!(!names.iter().any(|n| n.starts_with("legacy.")));
    assert!(names.iter().any(|n| n == "devops.deploy"));

    let err = host.call_tool("legacy.status", Map::new()).await.unwrap_err();
    assert!(matches!(err, ToolCallError::UnknownTool(_)));
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_tools() {
    let root = plugin_root();
    let host = host_for(root.path(), Duration::from_secs(30));
    host.reload().await.unwrap();
    let before = host.list_tools().await.len();

    let path = root.path().to_path_buf();
    drop(root);
    assert!(!path.exists());

    assert!(host.reload().await.is_err());
    assert_eq!(host.list_tools().await.len(), before);
}

#[cfg(unix)]
#[tokio::test]
async fn test_direct_entry_point_and_symlinked_plugin() {
    use std::os::unix::fs::PermissionsExt;

    let elsewhere = tempfile::tempdir().unwrap();
    let plugin_dir = elsewhere.path().join("tool");
    std::fs::create_dir(&plugin_dir).unwrap();
    let cli = plugin_dir.join("cli");
    std::fs::write(&cli, HELP_ONLY_PLUGIN).unwrap();
    std::fs::set_permissions(&cli, std::fs::Permissions::from_mode(0o755)).unwrap();

    let root = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(&plugin_dir, root.path().join("linked")).unwrap();

    let host = host_for(root.path(), Duration::from_secs(30));
    host.reload().await.unwrap();

    let output = host.call_tool("linked.status", Map::new()).await.unwrap();
    assert_eq!(output.text, "all good");
}

/// A plugin whose `--describe` answer is unusable but whose `--help` works.
fn help_fallback_plugin(describe: &str) -> String {
    format!(
        "#!/bin/sh\ncase \"$1\" in\n  --describe) {} ;;\n  --help) printf 'Available commands:\\n  ok    Still works\\n' ;;\n  ok) echo fine ;;\n  *) exit 2 ;;\nesac\n",
        describe
    )
}

#[tokio::test]
async fn test_unusable_describe_falls_back_to_help() {
    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "garbled", &help_fallback_plugin(r#"echo '{"commands": [oops'"#));
    write_plugin(root.path(), "shapeless", &help_fallback_plugin(r#"echo '{"plugin": {}}'"#));
    write_plugin(root.path(), "stalled", &help_fallback_plugin("exec sleep 10"));

    let started = Instant::now();
    let registry = PluginDiscoverer::new(
        DiscoveryConfig::new().with_describe_timeout(Duration::from_millis(500)),
    )
    .discover(root.path())
    .await
    .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    for name in ["garbled", "shapeless", "stalled"] {
        let record = registry
            .get(name)
            .unwrap_or_else(|| panic!("{} was not registered", name));
        assert_eq!(record.method, DiscoveryMethod::HelpText, "{}", name);
        assert_eq!(record.commands.keys().collect::<Vec<_>>(), vec!["ok"], "{}", name);
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_commands_the_plugin_started() {
    const LINGERING_PLUGIN: &str = r#"#!/bin/sh
    case "$1" in
      --describe) echo '{"commands": [{"name": "linger"}]}' ;;
      linger) sh -c 'echo $$ > linger.pid; exec sleep 30'; echo done ;;
      *) exit 2 ;;
    esac
    "#;

    let root = tempfile::tempdir().unwrap();
    write_plugin(root.path(), "lingering", LINGERING_PLUGIN);
    let host = host_for(root.path(), Duration::from_millis(500));
    host.reload().await.unwrap();

    let err = host
        .call_tool("lingering.linger", Map::new())
        .await
        .unwrap_err();
    match err {
        ToolCallError::Execution(ref e) => {
            assert!(e.is_timeout());
            assert_eq!(e.to_string(), "plugin command timed out after 500ms");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let pid_file = root.path().join("lingering").join("linger.pid");
    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let gone = |pid: i32| {
        std::fs::read_to_string(format!("/proc/{}/stat", pid))
            .map(|stat| stat.rsplit(')').next().map_or(false, |s| s.trim_start().starts_with('Z')))
            .unwrap_or(true)
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while !gone(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(gone(pid), "sleep {} outlived the timed-out plugin", pid);
}
