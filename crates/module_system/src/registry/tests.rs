use super::*;
use crate::boundary::StaticBoundaries;
use crate::coordinate::Coordinate;
use crate::events::RecordingListener;
use crate::properties::PropertyHolder;
use crate::repository::InMemoryTransport;
use crate::test_support::{build_package, write_package};
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

/// Lifecycle calls of every test module, as "<name>:<hook>".
static LIFECYCLE: parking_lot::Mutex<Vec<String>> = parking_lot::const_mutex(Vec::new());

static FAIL_ENABLE: AtomicBool = AtomicBool::new(false);

fn lifecycle_of(prefix: &str) -> Vec<String> {
    LIFECYCLE
        .lock()
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .cloned()
        .collect()
}

struct Recorder {
    name: &'static str,
    reloadable: bool,
    fail_disable: bool,
}

impl Module for Recorder {
    fn enable(&mut self) -> Result<(), ModuleSystemError> {
        if self.name.starts_with("faulty") && FAIL_ENABLE.load(Ordering::SeqCst) {
            return Err(ModuleSystemError::Hook(format!("{} refused to start", self.name)));
        }
        LIFECYCLE.lock().push(format!("{}:enable", self.name));
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ModuleSystemError> {
        LIFECYCLE.lock().push(format!("{}:disable", self.name));
        if self.fail_disable {
            return Err(ModuleSystemError::Hook(format!("{} failed to stop", self.name)));
        }
        Ok(())
    }

    fn is_reloadable(&self) -> bool {
        self.reloadable
    }
}

/// A module whose enable hook always fails.
struct Refuser;

impl Module for Refuser {
    fn enable(&mut self) -> Result<(), ModuleSystemError> {
        Err(ModuleSystemError::Hook("refuser never starts".to_string()))
    }

    fn disable(&mut self) -> Result<(), ModuleSystemError> {
        Ok(())
    }
}

fn refuser() -> Box<dyn Module> {
    Box::new(Refuser)
}

macro_rules! recorder {
    ($factory:ident, $name:expr) => {
        recorder!($factory, $name, true, false);
    };
    ($factory:ident, $name:expr, $reloadable:expr, $fail_disable:expr) => {
        fn $factory() -> Box<dyn Module> {
            Box::new(Recorder {
                name: $name,
                reloadable: $reloadable,
                fail_disable: $fail_disable,
            })
        }
    };
}

recorder!(order_a, "order_a");
recorder!(order_b, "order_b");
recorder!(order_c, "order_c");
recorder!(dup_one, "dup_one");
recorder!(types_signs, "types_signs");
recorder!(valid_core, "valid_core");
recorder!(valid_app, "valid_app");
recorder!(libs_user, "libs_user");
recorder!(faulty_module, "faulty_module");
recorder!(stubborn, "stubborn", true, true);
recorder!(props_module, "props_module");
recorder!(events_module, "events_module");
recorder!(reload_soft, "reload_soft");
recorder!(reload_pinned, "reload_pinned", false, false);
recorder!(reload_fixed, "reload_fixed");
recorder!(update_me, "update_me");
recorder!(reread_me, "reread_me");
recorder!(batch_plain, "batch_plain");
recorder!(batch_after_refusal, "batch_after_refusal");
recorder!(codec_user, "codec_user");
recorder!(renamed_old, "renamed_old");
recorder!(renamed_new, "renamed_new");

fn codec() -> Coordinate {
    Coordinate::new("org.x", "codec", "1.0.0")
}

fn boundaries() -> Arc<StaticBoundaries> {
    Arc::new(
        StaticBoundaries::new()
            .with_module("order_a", order_a, &[])
            .with_module("order_b", order_b, &[])
            .with_module("order_c", order_c, &[])
            .with_module("dup_one", dup_one, &[])
            .with_module("types_signs", types_signs, &["signs::SignLayout"])
            .with_module("valid_core", valid_core, &[])
            .with_module("valid_app", valid_app, &[])
            .with_module("libs_user", libs_user, &[])
            .with_module("faulty_module", faulty_module, &[])
            .with_module("stubborn", stubborn, &[])
            .with_module("props_module", props_module, &[])
            .with_module("events_module", events_module, &[])
            .with_module("reload_soft", reload_soft, &[])
            .with_module("reload_pinned", reload_pinned, &[])
            .with_module("reload_fixed", reload_fixed, &[])
            .with_module("update_me", update_me, &[])
            .with_module("reread_me", reread_me, &[])
            .with_module("batch_plain", batch_plain, &[])
            .with_module("batch_after_refusal", batch_after_refusal, &[])
            .with_module("refuser", refuser, &[])
            .with_module("codec_user", codec_user, &["codec_user::Main"])
            .with_module("renamed_old", renamed_old, &[])
            .with_module("renamed_new", renamed_new, &[])
            .with_shared_type("codec::Encoder", codec()),
    )
}

struct Fixture {
    dir: TempDir,
    boundaries: Arc<StaticBoundaries>,
    transport: Arc<InMemoryTransport>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            boundaries: boundaries(),
            transport: Arc::new(InMemoryTransport::new()),
        }
    }

    fn modules_dir(&self) -> PathBuf {
        self.dir.path().join("modules")
    }

    fn config(&self) -> RegistryConfig {
        RegistryConfig {
            modules_dir: self.modules_dir(),
            resolver: ResolverConfig {
                cache_dir: self.dir.path().join("cache"),
                repositories: Vec::new(),
                artifact_extension: "so".to_string(),
                ..ResolverConfig::default()
            },
            ..RegistryConfig::default()
        }
    }

    fn registry(&self) -> ModuleRegistry {
        self.registry_with(self.config())
    }

    fn registry_with(&self, config: RegistryConfig) -> ModuleRegistry {
        ModuleRegistry::new(config, self.boundaries.clone(), self.transport.clone())
    }

    /// Writes a package holding `manifest` into the modules directory.
    fn package(&self, file_name: &str, manifest: &str) -> PathBuf {
        self.package_with(file_name, &[("module.json", manifest)])
    }

    fn package_with(&self, file_name: &str, entries: &[(&str, &str)]) -> PathBuf {
        std::fs::create_dir_all(self.modules_dir()).unwrap();
        let path = self.modules_dir().join(file_name);
        write_package(&path, entries);
        path
    }
}

fn manifest(name: &str, depend: &[&str]) -> String {
    serde_json::json!({ "name": name, "main": name, "depend": depend }).to_string()
}

fn names(modules: &[ModuleInfo]) -> Vec<&str> {
    modules.iter().map(|module| module.name.as_str()).collect()
}

#[test]
fn test_load_all_unloaded_respects_dependencies() {
    let fixture = Fixture::new();
    fixture.package("1-c.tar.gz", &manifest("order_c", &["order_b"]));
    fixture.package("2-a.tar.gz", &manifest("order_a", &[]));
    fixture.package("3-b.tar.gz", &manifest("order_b", &["order_a"]));

    let registry = fixture.registry();
    registry.load_all_unloaded().unwrap();

    assert_eq!(names(&registry.loaded_modules()), vec!["order_a", "order_b", "order_c"]);
    assert_eq!(
        lifecycle_of("order_"),
        vec!["order_a:enable", "order_b:enable", "order_c:enable"]
    );
    assert_eq!(registry.known_manifests().len(), 3);

    // A second pass finds nothing new to load.
    registry.load_all_unloaded().unwrap();
    assert_eq!(registry.loaded_modules().len(), 3);
}

#[test]
fn test_duplicate_package_and_duplicate_name() {
    let fixture = Fixture::new();
    let first = fixture.package("first.tar.gz", &manifest("dup_one", &[]));
    let second = fixture.package("second.tar.gz", &manifest("dup_one", &[]));
    let registry = fixture.registry();

    registry.load_module_from_path(&first).unwrap();
    assert!(matches!(
        registry.load_module_from_path(&first),
        Err(ModuleSystemError::DuplicatePackage(path)) if path == first
    ));
    assert!(matches!(
        registry.load_module_from_path(&second),
        Err(ModuleSystemError::DuplicateName(name)) if name == "dup_one"
    ));
    assert_eq!(registry.loaded_modules().len(), 1);
}

#[test]
fn test_unload_of_unknown_module_fails() {
    let fixture = Fixture::new();
    let registry = fixture.registry();
    let stranger = ModuleInfo {
        id: Uuid::new_v4(),
        name: "stranger".to_string(),
        package_path: PathBuf::from("stranger.tar.gz"),
    };
    assert!(matches!(
        registry.unload_module(&stranger),
        Err(ModuleSystemError::NotLoaded(_))
    ));
}

#[test]
fn test_unload_releases_types_and_frees_the_name() {
    let fixture = Fixture::new();
    let package = fixture.package("signs.tar.gz", &manifest("types_signs", &[]));
    let registry = fixture.registry();

    let module = registry.load_module_from_path(&package).unwrap();
    let found = registry.resolve_type_name("signs::SignLayout").unwrap();
    assert_eq!(found.module, "types_signs");
    assert!(matches!(
        registry.resolve_type_name("other::Missing"),
        Err(ModuleSystemError::TypeNotFound(_))
    ));

    registry.unload_module(&module).unwrap();
    assert!(matches!(
        registry.resolve_type_name("signs::SignLayout"),
        Err(ModuleSystemError::TypeNotFound(_))
    ));
    assert!(!registry.is_loaded("types_signs"));
    assert!(matches!(
        registry.unload_module(&module),
        Err(ModuleSystemError::NotLoaded(_))
    ));

    let reloaded = registry.load_module_from_path(&package).unwrap();
    assert_ne!(reloaded.id, module.id);
    assert!(registry.resolve_type_name("signs::SignLayout").is_ok());
}

#[test]
fn test_invalid_manifests_are_reported_and_excluded() {
    let fixture = Fixture::new();
    fixture.package("core.tar.gz", &manifest("valid_core", &[]));
    fixture.package("app.tar.gz", &manifest("valid_app", &["valid_core"]));
    fixture.package("self.tar.gz", &manifest("valid_self", &["valid_self"]));
    fixture.package("ghost.tar.gz", &manifest("valid_ghost", &["nowhere"]));
    fixture.package("orphan.tar.gz", &manifest("valid_orphan", &["valid_ghost"]));
    fixture.package("ring1.tar.gz", &manifest("valid_ring1", &["valid_ring2"]));
    fixture.package("ring2.tar.gz", &manifest("valid_ring2", &["valid_ring1"]));
    fixture.package("broken.tar.gz", "{ not json");

    let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let registry = fixture.registry().with_failure_handler(move |failure| {
        sink.lock().push(failure.to_string());
        Ok(())
    });

    registry.load_all_unloaded().unwrap();

    let mut loaded = names(&registry.loaded_modules())
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    loaded.sort();
    assert_eq!(loaded, vec!["valid_app", "valid_core"]);

    let reported = reported.lock();
    assert_eq!(reported.len(), 6);
    assert!(reported.iter().any(|message| message.contains("nowhere")));
    assert!(reported.iter().any(|message| message.contains("valid_self")));
}

#[test]
fn test_default_failure_handler_rethrows() {
    let fixture = Fixture::new();
    fixture.package("ghost.tar.gz", &manifest("valid_ghost", &["nowhere"]));

    let registry = fixture.registry();
    match registry.load_all_unloaded() {
        Err(ModuleSystemError::DependencyCheck(ModuleLoadError::MissingDependencies { missing, .. })) => {
            assert_eq!(missing, vec!["nowhere".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(registry.loaded_modules().is_empty());
}

#[test]
fn test_library_dependencies_fall_back_to_second_repository() {
    let fixture = Fixture::new();
    let repo_one = "https://repo.one/maven2";
    let repo_two = "https://repo.two/maven2";
    let lib = Coordinate::new("org.x", "lib", "1.2.0");
    let artifact = lib.resolve("so");
    fixture.transport.insert(artifact.binary_url(repo_two), "binary");
    fixture.transport.insert(artifact.descriptor_url(repo_two), "<project/>");
    fixture.transport.take_offline(repo_one);

    let package = fixture.package(
        "libs.tar.gz",
        &serde_json::json!({
            "name": "libs_user",
            "main": "libs_user",
            "repositories": [repo_one, repo_two],
            "dependencies": [{"groupId": "org.x", "artifactId": "lib", "version": "1.2.0"}]
        })
        .to_string(),
    );

    let registry = fixture.registry();
    registry.load_module_from_path(&package).unwrap();

    assert!(fixture.boundaries.is_shared(&lib));
    assert_eq!(fixture.boundaries.shared_count(), 1);
    assert_eq!(fixture.transport.request_count(&artifact.binary_url(repo_two)), 1);
    assert!(fixture.dir.path().join("cache/org/x/lib/1.2.0/lib-1.2.0.so").is_file());
}

#[test]
fn test_unavailable_library_fails_the_load() {
    let fixture = Fixture::new();
    let package = fixture.package(
        "libs.tar.gz",
        &serde_json::json!({
            "name": "libs_user",
            "main": "libs_user",
            "repositories": ["https://repo.one/maven2"],
            "dependencies": [{"groupId": "org.x", "artifactId": "ghost", "version": "1.0.0"}]
        })
        .to_string(),
    );

    let registry = fixture.registry();
    let error = registry.load_module_from_path(&package).unwrap_err();
    assert!(matches!(error, ModuleSystemError::LoadFailed { ref package, .. } if package.ends_with("libs.tar.gz")));
    assert!(matches!(error.root_cause(), ModuleSystemError::ArtifactUnavailable(_)));
    assert!(registry.loaded_modules().is_empty());
    assert_eq!(fixture.boundaries.live_boundaries(), 0);
}

#[test]
fn test_failing_enable_rolls_back() {
    let fixture = Fixture::new();
    let package = fixture.package("faulty.tar.gz", &manifest("faulty_module", &[]));
    let registry = fixture.registry();

    FAIL_ENABLE.store(true, Ordering::SeqCst);
    let result = registry.load_module_from_path(&package);
    FAIL_ENABLE.store(false, Ordering::SeqCst);

    let error = result.unwrap_err();
    assert!(matches!(error.root_cause(), ModuleSystemError::Hook(_)));
    assert!(!registry.is_loaded("faulty_module"));
    assert_eq!(fixture.boundaries.live_boundaries(), 0);

    registry.load_module_from_path(&package).unwrap();
    assert!(registry.is_loaded("faulty_module"));
}

#[test]
fn test_disable_failure_never_blocks_unload() {
    let fixture = Fixture::new();
    let package = fixture.package("stubborn.tar.gz", &manifest("stubborn", &[]));

    let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let tolerant = fixture.registry().with_failure_handler(move |failure| {
        sink.lock().push(failure.to_string());
        Ok(())
    });
    let module = tolerant.load_module_from_path(&package).unwrap();
    tolerant.unload_module(&module).unwrap();
    assert!(!tolerant.is_loaded("stubborn"));
    assert_eq!(reported.lock().len(), 1);

    let strict = fixture.registry();
    let module = strict.load_module_from_path(&package).unwrap();
    assert!(matches!(
        strict.unload_module(&module),
        Err(ModuleSystemError::Hook(_))
    ));
    assert!(!strict.is_loaded("stubborn"));
    assert_eq!(fixture.boundaries.live_boundaries(), 0);
}

#[test]
fn test_unload_resets_shared_properties() {
    let fixture = Fixture::new();
    let package = fixture.package("props.tar.gz", &manifest("props_module", &[]));
    let registry = fixture.registry();

    let holder = Arc::new(PropertyHolder::new());
    registry.track_shared_state(holder.clone());
    let property = holder.set_property("motd", "Welcome".to_string()).unwrap();

    let module = registry.load_module_from_path(&package).unwrap();
    assert!(property.is_decoded());
    registry.unload_module(&module).unwrap();

    assert!(!property.is_decoded());
    assert_eq!(*holder.get_value::<String>("motd").unwrap().unwrap(), "Welcome");
}

#[test]
fn test_listeners_see_load_and_unload() {
    let fixture = Fixture::new();
    let package = fixture.package("events.tar.gz", &manifest("events_module", &[]));
    let registry = fixture.registry();
    let listener = Arc::new(RecordingListener::new());
    registry.subscribe(listener.clone());

    let module = registry.load_module_from_path(&package).unwrap();
    registry.unload_module(&module).unwrap();

    assert_eq!(
        listener.events(),
        vec![ModuleEvent::Loaded(module.clone()), ModuleEvent::Unloaded(module.clone())]
    );
    assert_eq!(listener.released(), vec![module]);
}

#[test]
fn test_reload_all_reloadable_keeps_pinned_modules() {
    let fixture = Fixture::new();
    fixture.package("soft.tar.gz", &manifest("reload_soft", &[]));
    fixture.package("pinned.tar.gz", &manifest("reload_pinned", &[]));
    fixture.package(
        "fixed.tar.gz",
        &serde_json::json!({ "name": "reload_fixed", "main": "reload_fixed", "reloadable": false }).to_string(),
    );

    let registry = fixture.registry();
    registry.load_all_unloaded().unwrap();
    let before: Vec<ModuleInfo> = registry.loaded_modules();

    registry.unload_all_reloadable().unwrap();
    let mut remaining = names(&registry.loaded_modules())
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    remaining.sort();
    assert_eq!(remaining, vec!["reload_fixed", "reload_pinned"]);

    registry.reload_all_reloadable().unwrap();
    assert_eq!(registry.loaded_modules().len(), 3);
    let soft_before = before.iter().find(|m| m.name == "reload_soft").unwrap();
    let soft_after = registry.module_by_name("reload_soft").unwrap();
    assert_ne!(soft_before.id, soft_after.id);
    assert_eq!(
        lifecycle_of("reload_soft"),
        vec!["reload_soft:enable", "reload_soft:disable", "reload_soft:enable"]
    );

    registry.unload_all().unwrap();
    assert!(registry.loaded_modules().is_empty());
    assert_eq!(fixture.boundaries.live_boundaries(), 0);
}

#[test]
fn test_reload_module_reads_the_package_again() {
    let fixture = Fixture::new();
    let package = fixture.package(
        "reread.tar.gz",
        &serde_json::json!({ "name": "reread_me", "main": "reread_me", "version": "1.0.0" }).to_string(),
    );
    let registry = fixture.registry();
    let module = registry.load_module_from_path(&package).unwrap();

    fixture.package(
        "reread.tar.gz",
        &serde_json::json!({ "name": "reread_me", "main": "reread_me", "version": "1.1.0" }).to_string(),
    );
    let reloaded = registry.reload_module(&module).unwrap();

    assert_eq!(reloaded.package_path, package);
    assert_eq!(
        registry.manifest_of("reread_me").unwrap().version.as_deref(),
        Some("1.1.0")
    );
}

#[test]
fn test_allow_listed_module_is_updated_before_loading() {
    let fixture = Fixture::new();
    let repository = "https://updates.example.org";
    let updater = r#"{"groupId": "org.example", "artifactId": "update-me", "repository": "https://updates.example.org"}"#;
    let package = fixture.package_with(
        "update.tar.gz",
        &[
            (
                "module.json",
                r#"{"name": "update_me", "main": "update_me", "version": "1.0.0"}"#,
            ),
            ("updater.json", updater),
        ],
    );

    fixture.transport.insert(
        format!("{repository}/org/example/update-me/maven-metadata.xml"),
        "<metadata><versioning><latest>1.1.0</latest></versioning></metadata>",
    );
    let updated = build_package(
        Vec::new(),
        &[
            (
                "module.json",
                r#"{"name": "update_me", "main": "update_me", "version": "1.1.0"}"#,
            ),
            ("updater.json", updater),
        ],
    );
    fixture.transport.insert(
        format!("{repository}/org/example/update-me/1.1.0/update-me-1.1.0.tar.gz"),
        updated,
    );

    let mut config = fixture.config();
    config.updatable_modules = vec!["update_me".to_string()];
    config.install_updates = true;
    let registry = fixture.registry_with(config);

    registry.load_module_from_path(&package).unwrap();
    assert_eq!(
        registry.manifest_of("update_me").unwrap().version.as_deref(),
        Some("1.1.0")
    );
    assert_eq!(registry.known_manifests().len(), 1);
}

/// Collects every failure passed to the handler.
fn collecting(registry: ModuleRegistry) -> (ModuleRegistry, Arc<parking_lot::Mutex<Vec<ModuleSystemError>>>) {
    let reported = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let registry = registry.with_failure_handler(move |failure| {
        sink.lock().push(failure);
        Ok(())
    });
    (registry, reported)
}

#[test]
fn test_unavailable_library_does_not_block_later_modules() {
    let fixture = Fixture::new();
    fixture.package(
        "1-bad.tar.gz",
        &serde_json::json!({
            "name": "libs_user",
            "main": "libs_user",
            "repositories": ["https://repo.one/maven2"],
            "dependencies": [{"groupId": "org.x", "artifactId": "ghost", "version": "1.0.0"}]
        })
        .to_string(),
    );
    fixture.package("2-good.tar.gz", &manifest("batch_plain", &[]));

    let (registry, reported) = collecting(fixture.registry());
    registry.load_all_unloaded().unwrap();

    assert_eq!(names(&registry.loaded_modules()), vec!["batch_plain"]);
    let reported = reported.lock();
    assert_eq!(reported.len(), 1);
    assert!(matches!(reported[0].root_cause(), ModuleSystemError::ArtifactUnavailable(_)));

    // A later single load is not affected either.
    drop(reported);
    let package = fixture.package("3-valid.tar.gz", &manifest("valid_core", &[]));
    registry.load_module_from_path(&package).unwrap();
    assert!(registry.is_loaded("valid_core"));
}

#[test]
fn test_failing_enable_does_not_block_later_modules() {
    let fixture = Fixture::new();
    fixture.package("1-refuser.tar.gz", &manifest("refuser", &[]));
    fixture.package("2-after.tar.gz", &manifest("batch_after_refusal", &[]));

    let (registry, reported) = collecting(fixture.registry());
    registry.load_all_unloaded().unwrap();

    assert_eq!(names(&registry.loaded_modules()), vec!["batch_after_refusal"]);
    assert_eq!(lifecycle_of("batch_after"), vec!["batch_after_refusal:enable"]);
    let reported = reported.lock();
    assert_eq!(reported.len(), 1);
    assert!(matches!(reported[0].root_cause(), ModuleSystemError::Hook(_)));
    assert_eq!(fixture.boundaries.live_boundaries(), 1);
}

#[test]
fn test_loaded_module_stays_known_when_its_package_changes() {
    let fixture = Fixture::new();
    let package = fixture.package("renamed.tar.gz", &manifest("renamed_old", &[]));
    let registry = fixture.registry();
    registry.load_all_unloaded().unwrap();

    fixture.package("renamed.tar.gz", &manifest("renamed_new", &[]));
    registry.load_all_unloaded().unwrap();

    assert_eq!(names(&registry.loaded_modules()), vec!["renamed_old"]);
    let known = registry.known_manifests();
    assert!(known
        .iter()
        .any(|packaged| packaged.manifest.name == "renamed_old" && packaged.package_path == package));
}

#[test]
fn test_type_lookup_falls_back_to_shared_libraries() {
    let fixture = Fixture::new();
    let repository = "https://repo.one/maven2";
    let artifact = codec().resolve("so");
    fixture.transport.insert(artifact.binary_url(repository), "binary");
    fixture.transport.insert(artifact.descriptor_url(repository), "<project/>");

    let package = fixture.package(
        "codec.tar.gz",
        &serde_json::json!({
            "name": "codec_user",
            "main": "codec_user",
            "repositories": [repository],
            "dependencies": [{"groupId": "org.x", "artifactId": "codec", "version": "1.0.0"}]
        })
        .to_string(),
    );
    let registry = fixture.registry();
    assert!(registry.resolve_type_name_or_shared("codec::Encoder").is_err());

    registry.load_module_from_path(&package).unwrap();
    assert!(matches!(
        registry.resolve_type_name("codec::Encoder"),
        Err(ModuleSystemError::TypeNotFound(_))
    ));
    let shared = registry.resolve_type_name_or_shared("codec::Encoder").unwrap();
    assert_eq!(shared.module, "org.x:codec:1.0.0");

    let own = registry.resolve_type_name_or_shared("codec_user::Main").unwrap();
    assert_eq!(own.module, "codec_user");
    assert!(matches!(
        registry.resolve_type_name_or_shared("nothing::Here"),
        Err(ModuleSystemError::TypeNotFound(_))
    ));
}
