//! Provisioning workflow against the in-process fakes.

use fleet_common::api::ProvisionRequest;
use fleet_common::contract::{AGENT_MOUNT, env};
use fleet_common::{AgentStatus, RuntimeState};
use fleet_orchestrator::application::ports::{AgentRegistry, RestartPolicy};
use fleet_orchestrator::domain::{GatewayError, OrchestratorError, RuntimeError};

use crate::fakes::{BACKEND_NETWORK, FakeWorkspaces, GATEWAY_URL, Harness};

const AGENT: &str = "4f1c2e9a-7d3b-4c55-9e21-0a6b8c3d2f10";

fn request(user_id: &str, agent_id: Option<&str>) -> ProvisionRequest {
    ProvisionRequest {
        user_id: user_id.to_string(),
        agent_id: agent_id.map(str::to_string),
        behavior_spec: "# Ada\nBe concise.".to_string(),
        gateway_key: Some("sk-supplied".to_string()),
        display_name: Some("Ada".to_string()),
    }
}

fn env_value<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

// ── Happy path ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn provision_generates_id_and_registers_running_agent() {
    let h = Harness::new();

    let response = h
        .ctx
        .provisioner
        .provision(request("u1", None))
        .await
        .expect("provision");

    assert_eq!(response.agent_id.len(), 36, "uuid v4 expected");
    assert_eq!(response.status, AgentStatus::Running);
    let short = &response.agent_id[..8];
    assert_eq!(response.container_name, format!("agent_{short}"));
    assert_eq!(response.network_name, format!("agent_net_{short}"));

    let record = h
        .store
        .get(&response.agent_id)
        .await
        .expect("registry read")
        .expect("record written");
    assert_eq!(record.user_id, "u1");
    assert_eq!(record.display_name, "Ada");
    assert_eq!(record.status, AgentStatus::Running);
    assert_eq!(record.container_id, response.container_id);

    assert!(h.runtime.is_attached(&response.container_name, &response.network_name));
    assert!(h.runtime.is_attached(&response.container_name, BACKEND_NETWORK));
}

#[tokio::test]
async fn container_gets_workspace_env_and_restart_policy() {
    let h = Harness::new();
    let response = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .expect("provision");

    let container = h
        .runtime
        .container(&response.container_name)
        .expect("container exists");
    let spec = container.spec;
    assert_eq!(spec.restart, RestartPolicy::UnlessStopped);
    assert_eq!(spec.command, vec!["sleep".to_string(), "infinity".to_string()]);
    assert_eq!(spec.network.as_deref(), Some(response.network_name.as_str()));

    assert_eq!(env_value(&spec.env, env::AGENT_ID), Some(AGENT));
    assert_eq!(env_value(&spec.env, env::USER_ID), Some("u1"));
    assert_eq!(env_value(&spec.env, env::GATEWAY_BASE_URL), Some(GATEWAY_URL));
    assert_eq!(env_value(&spec.env, env::GATEWAY_API_KEY), Some("sk-supplied"));
    assert_eq!(env_value(&spec.env, env::ASSISTANT_API_KEY), Some("sk-supplied"));

    assert_eq!(spec.binds.len(), 1);
    assert_eq!(spec.binds[0].host_path, FakeWorkspaces::path_for(AGENT));
    assert_eq!(spec.binds[0].container_path, AGENT_MOUNT);
    assert!(!spec.binds[0].read_only);

    let written = h.workspaces.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].behavior_spec, "# Ada\nBe concise.");
    assert_eq!(written[0].config.gateway_base_url, GATEWAY_URL);
    assert_eq!(written[0].config.display_name, "Ada");
}

#[tokio::test]
async fn missing_key_is_issued_on_the_users_behalf() {
    let h = Harness::new();
    let mut req = request("u1", Some(AGENT));
    req.gateway_key = None;

    let response = h.ctx.provisioner.provision(req).await.expect("provision");

    assert_eq!(h.gateway.issued(), vec![("u1".to_string(), 25.0)]);
    let spec = h.runtime.container(&response.container_name).unwrap().spec;
    assert_eq!(
        env_value(&spec.env, env::GATEWAY_API_KEY),
        Some("sk-supplied")
    );
}

#[tokio::test]
async fn blank_display_name_falls_back_to_default() {
    let h = Harness::new();
    let mut req = request("u1", Some(AGENT));
    req.display_name = Some("   ".to_string());

    h.ctx.provisioner.provision(req).await.expect("provision");

    let record = h.store.get(AGENT).await.unwrap().unwrap();
    assert_eq!(record.display_name, "My Agent");
}

// ── Idempotency ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn retry_after_attach_failure_reuses_resources() {
    let h = Harness::new();
    h.runtime.fail_once(
        "attach_network",
        RuntimeError::Transport("daemon hung up".to_string()),
    );

    let err = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Runtime(_)), "{err:?}");
    assert!(h.store.get(AGENT).await.unwrap().is_none());

    let response = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .expect("retry succeeds");

    assert_eq!(h.runtime.container_creates(), 1);
    assert_eq!(h.runtime.network_creates(), 1);
    assert!(h.runtime.is_attached(&response.container_name, BACKEND_NETWORK));
    assert_eq!(
        h.store.get(AGENT).await.unwrap().unwrap().status,
        AgentStatus::Running
    );
}

#[tokio::test]
async fn retry_without_credential_issues_a_single_key() {
    let h = Harness::new();
    h.runtime.fail_once(
        "attach_network",
        RuntimeError::Transport("daemon hung up".to_string()),
    );
    let mut req = request("u1", Some(AGENT));
    req.gateway_key = None;

    assert!(h.ctx.provisioner.provision(req.clone()).await.is_err());
    let response = h.ctx.provisioner.provision(req).await.expect("retry succeeds");

    assert_eq!(h.gateway.issued().len(), 1);
    let spec = h.runtime.container(&response.container_name).unwrap().spec;
    assert_eq!(
        env_value(&spec.env, env::GATEWAY_API_KEY),
        Some("sk-scoped-u1-1")
    );
    assert_eq!(h.runtime.container_creates(), 1);
}

#[tokio::test]
async fn container_recreated_without_credential_is_discarded() {
    let h = Harness::new();
    h.runtime.fail_once(
        "attach_network",
        RuntimeError::Transport("daemon hung up".to_string()),
    );
    let mut req = request("u1", Some(AGENT));
    req.gateway_key = None;
    assert!(h.ctx.provisioner.provision(req.clone()).await.is_err());

    h.runtime.drop_before_next_run();
    let err = h.ctx.provisioner.provision(req.clone()).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Runtime(_)), "{err:?}");
    assert_eq!(h.runtime.container_count(), 0);

    let response = h.ctx.provisioner.provision(req).await.expect("third attempt");
    let spec = h.runtime.container(&response.container_name).unwrap().spec;
    assert_eq!(
        env_value(&spec.env, env::GATEWAY_API_KEY),
        Some("sk-scoped-u1-2")
    );
    assert_eq!(h.gateway.issued().len(), 2);
}

#[tokio::test]
async fn same_prefix_agent_ids_never_share_resources() {
    let h = Harness::new();
    let first = h
        .ctx
        .provisioner
        .provision(request("u1", Some("abcd1234-aaaa")))
        .await
        .expect("first agent");

    let mut req = request("u2", Some("abcd1234-bbbb"));
    req.gateway_key = None;
    let err = h.ctx.provisioner.provision(req).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::InvalidState(_)), "{err:?}");
    assert!(h.gateway.issued().is_empty());
    assert_eq!(h.runtime.container_creates(), 1);
    assert!(h.store.get("abcd1234-bbbb").await.unwrap().is_none());
    assert!(matches!(
        h.ctx.reconciler.deprovision("abcd1234-bbbb").await,
        Err(OrchestratorError::AgentNotFound(_))
    ));

    let report = h.ctx.reconciler.status("abcd1234-aaaa").await.unwrap();
    assert_eq!(report.runtime_status, RuntimeState::Running);
    let container = h.runtime.container(&first.container_name).unwrap();
    assert_eq!(container.id, first.container_id);
    assert_eq!(env_value(&container.spec.env, env::USER_ID), Some("u1"));
}

#[tokio::test]
async fn same_prefix_id_cannot_adopt_a_partial_provisioning() {
    let h = Harness::new();
    h.runtime.fail_once(
        "attach_network",
        RuntimeError::Transport("daemon hung up".to_string()),
    );
    assert!(
        h.ctx
            .provisioner
            .provision(request("u1", Some("abcd1234-aaaa")))
            .await
            .is_err()
    );

    let err = h
        .ctx
        .provisioner
        .provision(request("u2", Some("abcd1234-bbbb")))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState(_)), "{err:?}");

    h.ctx
        .provisioner
        .provision(request("u1", Some("abcd1234-aaaa")))
        .await
        .expect("owner retry succeeds");
    let record = h.store.get("abcd1234-aaaa").await.unwrap().unwrap();
    assert_eq!(record.user_id, "u1");
    assert_eq!(h.runtime.container_creates(), 1);
}

#[tokio::test]
async fn unlabeled_network_under_agent_name_is_refused() {
    let h = Harness::new();
    h.runtime.add_network("agent_net_4f1c2e9a");
    let mut req = request("u1", Some(AGENT));
    req.gateway_key = None;

    let err = h.ctx.provisioner.provision(req).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::InvalidState(_)), "{err:?}");
    assert!(h.gateway.issued().is_empty());
    assert_eq!(h.runtime.container_count(), 0);
}

#[tokio::test]
async fn provisioning_a_live_agent_again_returns_existing_record() {
    let h = Harness::new();
    let first = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap();
    let second = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.runtime.count("run_container"), 1);
}

#[tokio::test]
async fn paused_agent_is_returned_as_paused() {
    let h = Harness::new();
    h.ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap();
    h.ctx.reconciler.pause(AGENT).await.unwrap();

    let again = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap();
    assert_eq!(again.status, AgentStatus::Paused);
}

#[tokio::test]
async fn deprovisioned_id_is_not_reused() {
    let h = Harness::new();
    h.ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap();
    h.ctx.reconciler.deprovision(AGENT).await.unwrap();

    let err = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err:?}");
    assert_eq!(h.runtime.container_count(), 0);
}

#[tokio::test]
async fn another_users_agent_id_is_rejected() {
    let h = Harness::new();
    h.ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap();

    let err = h
        .ctx
        .provisioner
        .provision(request("u2", Some(AGENT)))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(_)), "{err:?}");
    assert_eq!(h.store.get(AGENT).await.unwrap().unwrap().user_id, "u1");
}

// ── Validation and failures ───────────────────────────────────────────────────

#[tokio::test]
async fn missing_user_id_fails_before_any_side_effect() {
    let h = Harness::new();

    let err = h
        .ctx
        .provisioner
        .provision(request("  ", None))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Validation(_)), "{err:?}");
    assert!(h.runtime.calls().is_empty());
    assert!(h.workspaces.written().is_empty());
    assert!(h.gateway.issued().is_empty());
}

#[tokio::test]
async fn malformed_agent_id_is_rejected() {
    let h = Harness::new();

    for bad in ["short", "../../etc/passwd", "agent id with spaces"] {
        let err = h
            .ctx
            .provisioner
            .provision(request("u1", Some(bad)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)), "{bad}: {err:?}");
    }
    assert!(h.runtime.calls().is_empty());
}

#[tokio::test]
async fn gateway_rejection_surfaces_upstream_status() {
    let h = Harness::new();
    h.gateway.fail_once(GatewayError::Upstream {
        status: 401,
        body: "invalid master key".to_string(),
    });
    let mut req = request("u1", Some(AGENT));
    req.gateway_key = None;

    let err = h.ctx.provisioner.provision(req).await.unwrap_err();

    assert_eq!(
        err,
        OrchestratorError::UpstreamGateway {
            status: 401,
            body: "invalid master key".to_string(),
        }
    );
    assert_eq!(h.runtime.network_creates(), 0);
    assert_eq!(h.runtime.container_count(), 0);
}

#[tokio::test]
async fn missing_backend_network_is_reported() {
    let h = Harness::new();
    h.runtime.vanish_network(BACKEND_NETWORK);

    let err = h
        .ctx
        .provisioner
        .provision(request("u1", Some(AGENT)))
        .await
        .unwrap_err();

    match err {
        OrchestratorError::Runtime(msg) => assert!(msg.contains(BACKEND_NETWORK), "{msg}"),
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert!(h.store.get(AGENT).await.unwrap().is_none());
    // The container is left for the retry to pick up.
    assert_eq!(
        h.runtime.container("agent_4f1c2e9a").map(|c| c.state),
        Some(RuntimeState::Running)
    );
}
