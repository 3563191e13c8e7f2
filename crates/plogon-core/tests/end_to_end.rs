//! End-to-end orchestrator test: a real `BuildDeps` driving
//! `Orchestrator::run` through one full build, against a fake container
//! runtime, a local git origin, and a local toolchain feed server — the
//! same depth the upstream publish-loop tests exercise against a local
//! mock registry rather than live infrastructure.

use std::collections::BTreeMap;
use std::path::PathBuf;

use plogon_container::{BuildOutcome, ContainerError, ContainerRuntime, ContainerSpec};
use plogon_core::{
    BuildDeps, Hydrator, Mode, NoopIssueCommenter, NoopPrLabeler, NoopWebServices, NullBlobStore, Orchestrator,
    TaskOutcome,
};
use plogon_core::needs::SafeLists;
use plogon_state::StateStore;
use plogon_toolchain::{ToolchainProvider, TrackOverrides};
use plogon_types::{BuildSection, BuildTask, Channel, Manifest, NullReporter, PluginSection, Reporter, TaskKind};
use tokio_util::sync::CancellationToken;

/// A `ContainerRuntime` that never touches Docker: it writes the build
/// report and images directory a real container would have produced,
/// then reports success.
struct FakeContainerRuntime {
    api_level: u32,
}

#[async_trait::async_trait(?Send)]
impl ContainerRuntime for FakeContainerRuntime {
    async fn run(&self, spec: ContainerSpec, _reporter: &mut dyn Reporter) -> Result<BuildOutcome, ContainerError> {
        std::fs::create_dir_all(spec.output_dir.join("images")).unwrap();
        std::fs::write(
            spec.output_dir.join("plogon-build.json"),
            format!(r#"{{"api_level": {}, "file_needs": [], "submodule_needs": []}}"#, self.api_level),
        )
        .unwrap();
        Ok(BuildOutcome::Success)
    }
}

/// Initialize a local git repository with one commit containing an
/// empty lockfile, so `plogon_git::acquire` can clone/fetch it without
/// any real network access.
fn init_origin_repo() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();

    std::fs::write(dir.path().join("packages.lock"), "version = 1\n").unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(std::path::Path::new("packages.lock")).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let signature = git2::Signature::now("plogon-tests", "plogon-tests@example.com").unwrap();
    let commit_oid = repo
        .commit(Some("HEAD"), &signature, &signature, "initial commit", &tree, &[])
        .unwrap();

    (dir, commit_oid.to_string())
}

/// Spin up a one-shot local descriptor feed serving a single track.
fn spawn_descriptor_server() -> (String, std::thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("server");
    let addr = server.server_addr().to_string();

    let handle = std::thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let body = r#"{
                "assembly_version": "1.0.0",
                "download_url": "http://127.0.0.1:1/unused.zip",
                "runtime_version": "8.0",
                "runtime_required": false
            }"#;
            let response = tiny_http::Response::from_string(body);
            let _ = request.respond(response);
        }
    });

    (addr, handle)
}

#[test]
fn orchestrator_run_drives_one_task_through_a_full_build() {
    let (origin_dir, commit) = init_origin_repo();
    let (descriptor_addr, descriptor_handle) = spawn_descriptor_server();

    let td = tempfile::tempdir().unwrap();
    let releases_dir = td.path().join("releases");
    // Pre-materialize the resolved track so `provide_track` never needs
    // to download an archive, only fetch its descriptor.
    std::fs::create_dir_all(releases_dir.join("release-1.0.0")).unwrap();

    let static_dir = td.path().join("static");
    std::fs::create_dir_all(&static_dir).unwrap();

    let toolchain = ToolchainProvider::new(format!("http://{descriptor_addr}"), releases_dir);
    let track_overrides = TrackOverrides::default();
    let hydrator = Hydrator::new("http://127.0.0.1:1", "nupkg", BTreeMap::new());
    let state_store = StateStore::new(&td.path().join("state"));
    let safe_lists = SafeLists::default();
    let container = FakeContainerRuntime { api_level: 9 };

    let mut blob_store = NullBlobStore;
    let mut issue_commenter = NoopIssueCommenter;
    let mut pr_labeler = NoopPrLabeler;
    let mut web_services = NoopWebServices;

    let manifest = Manifest {
        plugin: PluginSection {
            repository: origin_dir.path().to_str().unwrap().to_string(),
            commit,
            project_path: ".".to_string(),
            owners: vec!["alice".to_string()],
            changelog: String::new(),
            version: Some("1.0.0".to_string()),
        },
        build: BuildSection::default(),
        path_in_repo: PathBuf::new(),
        directory: PathBuf::new(),
    };

    let task = BuildTask {
        internal_name: "FooPlugin".to_string(),
        channel: Channel::Stable,
        manifest: Some(manifest),
        have_commit: None,
        have_version: None,
        have_time: None,
        kind: TaskKind::Build,
        is_new_plugin: true,
        is_new_in_channel: true,
        is_github: false,
        is_gitlab: false,
    };

    let deps = BuildDeps {
        container: &container,
        toolchain: &toolchain,
        track_overrides: &track_overrides,
        hydrator: &hydrator,
        state_store: &state_store,
        blob_store: &mut blob_store,
        issue_commenter: &mut issue_commenter,
        pr_labeler: &mut pr_labeler,
        web_services: &mut web_services,
        safe_lists: &safe_lists,
        work_root: td.path().join("work"),
        scratch_output_root: td.path().join("output"),
        packages_root: td.path().join("packages"),
        static_dir,
        artifact_root: td.path().join("artifacts"),
        default_image: "plogon/build:latest".to_string(),
        blob_bucket: "plogon-artifacts".to_string(),
        required_api_level: 9,
        actor: None,
        privileged_actors: Vec::new(),
        build_all: false,
        reviewer: "ci".to_string(),
        cancel: CancellationToken::new(),
        webhook: None,
    };

    // `Orchestrator::run` blocks on a few async subsystem calls from its
    // own synchronous driver; entering a runtime without running inside
    // one of its tasks mirrors how `plogon-cli`'s `main` drives it.
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let _guard = runtime.enter();

    let mut orchestrator = Orchestrator::new(deps);
    let mut reporter = NullReporter;
    let report = orchestrator.run(vec![task], Mode::Development, &mut reporter);

    assert!(!report.aborted);
    assert_eq!(report.tasks_run, 1);
    match &report.outcomes[0].1 {
        TaskOutcome::Built { version } => assert_eq!(version, "1.0.0"),
        other => panic!("expected a successful build, got {other:?}"),
    }
    assert_eq!(report.exit_code(Mode::Development), 0);

    let state = state_store.load().unwrap();
    assert!(state.get_plugin_state("stable", "FooPlugin").is_some());

    descriptor_handle.join().unwrap();
}
