//! End-to-end batching through a mapped tree.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use strata::{
    ArraySection, BatchOperation, ChangeRecorder, Changeset, ComposedSectionProvider, FlatSection,
    IndexPath, SectionProviderMapping, SegmentedSectionProvider, SingleElementSection,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn path(section: usize, item: usize) -> IndexPath {
    IndexPath::new(section, item)
}

fn collect(recorder: &ChangeRecorder) -> Arc<Mutex<Vec<Changeset>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    recorder
        .changeset_ready()
        .connect(move |changeset| sink.lock().push(changeset.clone()));
    received
}

#[test]
fn test_batch_across_the_tree_yields_ordered_operations() {
    init_tracing();

    let header = Arc::new(SingleElementSection::new(Some("title")));
    let first = Arc::new(ArraySection::from_vec(vec!["a", "b", "c"]));
    let second = Arc::new(ArraySection::from_vec(vec!["x", "y"]));
    let footer = Arc::new(ArraySection::from_vec(vec!["end"]));

    let feed = ComposedSectionProvider::with_name("feed");
    feed.append_section(first.clone());
    feed.append_section(second.clone());

    let root = ComposedSectionProvider::with_name("root");
    root.append_section(header.clone());
    root.append_provider(feed.clone());
    root.append_section(footer);

    let mapping = SectionProviderMapping::new(root);
    let recorder = ChangeRecorder::attach(&mapping);
    let received = collect(&recorder);

    recorder.perform_batch(|| {
        first.remove(0);
        feed.append_section(Arc::new(ArraySection::from_vec(vec!["new", "newer"])));
        header.replace(Some("renamed"));
        second.move_element(0, 1);
    });

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].operations(),
        vec![
            BatchOperation::RemoveElements(vec![path(1, 0)]),
            BatchOperation::UpdateElements(vec![path(0, 0)]),
            BatchOperation::InsertGroups(vec![3]),
            BatchOperation::MoveElement {
                from: path(2, 0),
                to: path(2, 1),
            },
        ]
    );
    assert_eq!(mapping.number_of_sections(), 5);
    assert_eq!(second.to_vec(), vec!["y", "x"]);
}

#[test]
fn test_flat_section_changes_reach_the_root() {
    init_tracing();

    let leading = Arc::new(ArraySection::from_vec(vec![1, 2]));
    let nested = ComposedSectionProvider::new();
    nested.append_section(Arc::new(ArraySection::from_vec(vec![3])));

    let flat = FlatSection::with_name("flat");
    flat.append_section(leading.clone());
    flat.append_provider(nested.clone());

    let root = ComposedSectionProvider::new();
    root.append_section(flat.clone());

    let mapping = SectionProviderMapping::new(root);
    let recorder = ChangeRecorder::attach(&mapping);
    let received = collect(&recorder);
    assert_eq!(mapping.number_of_elements(0), 3);

    nested.append_section(Arc::new(ArraySection::from_vec(vec![4, 5])));
    leading.remove(0);

    assert_eq!(mapping.number_of_elements(0), 4);
    let received = received.lock();
    assert_eq!(received.len(), 2);
    assert_eq!(
        received[0].operations(),
        vec![BatchOperation::InsertElements(vec![path(0, 3), path(0, 4)])]
    );
    assert_eq!(
        received[1].operations(),
        vec![BatchOperation::RemoveElements(vec![path(0, 0)])]
    );
}

#[test]
fn test_segment_switch_inside_a_batch_reloads_everything() {
    init_tracing();

    let list = Arc::new(ArraySection::from_vec(vec![1, 2, 3]));
    let segments = SegmentedSectionProvider::new();
    segments.append_section(Arc::new(ArraySection::from_vec(vec![10])));
    segments.append_section(Arc::new(ArraySection::from_vec(vec![20, 30])));

    let root = ComposedSectionProvider::new();
    root.append_section(list.clone());
    root.append_provider(segments.clone());

    let mapping = SectionProviderMapping::new(root);
    let recorder = ChangeRecorder::attach(&mapping);
    let received = collect(&recorder);
    let reloads = Arc::new(Mutex::new(0));
    let counter = reloads.clone();
    recorder.invalidated().connect(move |_| *counter.lock() += 1);

    recorder.perform_batch(|| {
        list.remove(1);
        segments.set_current_index(Some(1));
        list.append(4);
    });

    assert_eq!(*reloads.lock(), 1);
    assert!(received.lock().is_empty());
    assert_eq!(mapping.number_of_elements(1), 2);

    list.append(5);
    assert_eq!(received.lock().len(), 1);
}

#[test]
fn test_mutating_from_a_changeset_handler() {
    init_tracing();

    let source = Arc::new(ArraySection::from_vec(vec![1]));
    let echo = Arc::new(ArraySection::from_vec(Vec::<i32>::new()));

    let root = ComposedSectionProvider::new();
    root.append_section(source.clone());
    root.append_section(echo.clone());

    let mapping = SectionProviderMapping::new(root);
    let recorder = ChangeRecorder::attach(&mapping);
    let received = collect(&recorder);

    let fired = Arc::new(AtomicBool::new(false));
    let target = echo.clone();
    let once = fired.clone();
    recorder.changeset_ready().connect(move |_| {
        if !once.swap(true, Ordering::SeqCst) {
            target.append(7);
        }
    });

    source.append(2);

    assert!(fired.load(Ordering::SeqCst));
    assert!(!recorder.is_batching());
    assert_eq!(echo.to_vec(), vec![7]);

    let received = received.lock();
    assert_eq!(received.len(), 2);
    assert_eq!(
        received[0].operations(),
        vec![BatchOperation::InsertElements(vec![path(0, 1)])]
    );
    assert_eq!(
        received[1].operations(),
        vec![BatchOperation::InsertElements(vec![path(1, 0)])]
    );
}

#[test]
fn test_nested_batches_publish_once() {
    init_tracing();

    let section = Arc::new(ArraySection::from_vec(vec![1, 2, 3]));
    let root = ComposedSectionProvider::new();
    root.append_section(section.clone());

    let mapping = SectionProviderMapping::new(root.clone());
    let recorder = ChangeRecorder::attach(&mapping);
    let received = collect(&recorder);

    recorder.perform_batch(|| {
        section.remove(0);
        recorder.perform_batch(|| {
            root.append_section(Arc::new(ArraySection::from_vec(vec![9])));
            section.append(4);
        });
        assert!(recorder.is_batching());
    });

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].operations(),
        vec![
            BatchOperation::RemoveElements(vec![path(0, 0)]),
            BatchOperation::InsertGroups(vec![1]),
            BatchOperation::InsertElements(vec![path(0, 2)]),
        ]
    );
}

#[test]
fn test_sequential_deletes_follow_the_live_tree() {
    init_tracing();

    let section = Arc::new(ArraySection::from_vec(vec!["a", "b", "c", "d"]));
    let root = ComposedSectionProvider::new();
    root.append_section(section.clone());

    let mapping = SectionProviderMapping::new(root);
    let recorder = ChangeRecorder::attach(&mapping);
    let received = collect(&recorder);

    recorder.perform_batch(|| {
        section.remove(2);
        section.remove(0);
        section.remove(1);
    });

    assert_eq!(section.to_vec(), vec!["b"]);
    assert_eq!(
        received.lock()[0].operations(),
        vec![BatchOperation::RemoveElements(vec![path(0, 3), path(0, 2), path(0, 0)])]
    );
}
