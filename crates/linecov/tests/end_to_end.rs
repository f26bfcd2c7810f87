//! Two collectors sharing one file store, the way two worker processes of
//! one deployment would.

use linecov::coverage::{LineCoverage, TrackingPhase};
use linecov::{
    combined_report, CounterProbe, CoverageCollector, FileStore, RuntimeProbe, StoreAdapter,
    TrackerConfig,
};
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r"
root: /srv/app
ignore:
  - spec/
groups:
  - name: Models
    pattern: ^/srv/app/models/
test_mode: true
background_reporting_enabled: false
";

struct Worker {
    probe: Arc<CounterProbe>,
    collector: CoverageCollector,
}

fn worker(store: Arc<FileStore>) -> Worker {
    let probe = Arc::new(CounterProbe::new());
    let collector = CoverageCollector::builder()
        .config(TrackerConfig::from_yaml_str(CONFIG).unwrap())
        .probe(probe.clone())
        .store(store)
        .build()
        .unwrap();
    Worker { probe, collector }
}

#[test]
fn test_workers_merge_into_shared_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("coverage.json")));
    let first = worker(store.clone());
    let second = worker(store.clone());

    // Boot: both workers load the model while eager loading.
    for w in [&first, &second] {
        w.collector.eager_loading().unwrap();
        let user = w
            .probe
            .register_file("/srv/app/models/user.rb", [false, true, true, false]);
        let _ = user.hit(2);
        let _ = w.collector.report_coverage().unwrap();
        w.collector.runtime().unwrap();
    }

    // Requests: each worker runs a method a different number of times.
    let a = first.probe.file("/srv/app/models/user.rb").unwrap();
    for _ in 0..3 {
        let _ = a.hit(3);
    }
    let b = second.probe.file("/srv/app/models/user.rb").unwrap();
    let _ = b.hit(3);
    let spec = second.probe.register_file("/srv/app/spec/user_spec.rb", [true]);
    let _ = spec.hit(1);
    // Default ignores apply even though the config lists only `spec/`.
    let vendored = first.probe.register_file("/srv/app/vendor/bundle/json.rb", [true]);
    let _ = vendored.hit(1);

    let first_flush = first.collector.report_coverage().unwrap();
    let second_flush = second.collector.report_coverage().unwrap();
    assert_eq!(first_flush.phase, TrackingPhase::Runtime);
    assert_eq!(first_flush.ignored, 1);
    assert_eq!(second_flush.ignored, 1);

    // A flush with nothing new is a no-op.
    assert!(!first.collector.report_coverage().unwrap().persisted);

    let eager = store.load_all(TrackingPhase::Eager).unwrap();
    assert_eq!(
        eager["/srv/app/models/user.rb"].data,
        LineCoverage::from(vec![None, Some(2), Some(0), None])
    );
    let runtime = store.load_all(TrackingPhase::Runtime).unwrap();
    assert_eq!(
        runtime["/srv/app/models/user.rb"].data,
        LineCoverage::from(vec![None, Some(0), Some(4), None])
    );
    assert!(!runtime.contains_key("/srv/app/spec/user_spec.rb"));
    assert!(!runtime.contains_key("/srv/app/vendor/bundle/json.rb"));

    let report = combined_report(&first.collector).unwrap();
    let user = report.file("/srv/app/models/user.rb").unwrap();
    assert_eq!(user.group.as_deref(), Some("Models"));
    assert_eq!(user.max_hits, 4);
    assert_eq!(report.group("Models").unwrap().coverage_percent, 100.0);
}

#[test]
fn test_restarted_probe_is_not_double_counted() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("coverage.json")));
    let w = worker(store.clone());
    let file = w.probe.register_file("/srv/app/jobs/sync.rb", [true]);

    for _ in 0..5 {
        let _ = file.hit(1);
    }
    let _ = w.collector.report_coverage().unwrap();

    // Counters restart from zero; the next sample is treated as fresh.
    w.probe.start();
    let _ = file.hit(1);
    let _ = w.collector.report_coverage().unwrap();

    let runtime = store.load_all(TrackingPhase::Runtime).unwrap();
    assert_eq!(runtime["/srv/app/jobs/sync.rb"].data, LineCoverage::from(vec![Some(6)]));
}

#[test]
fn test_clear_then_report_starts_over() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("coverage.json")));
    let w = worker(store.clone());
    let file = w.probe.register_file("/srv/app/jobs/sync.rb", [true, false]);
    let _ = file.hit(1);
    let _ = w.collector.report_coverage().unwrap();

    store.clear_all().unwrap();
    w.collector.reset().unwrap();
    let _ = w.collector.report_coverage().unwrap();

    let runtime = store.load_all(TrackingPhase::Runtime).unwrap();
    assert_eq!(
        runtime["/srv/app/jobs/sync.rb"].data,
        LineCoverage::from(vec![Some(1), None])
    );
}
