//! Tests for segment switching seen through a mapping and a recorder.

use std::sync::Arc;

use parking_lot::Mutex;
use strata::{
    ArraySection, ChangeRecorder, Changeset, ComposedSectionProvider, Section, SectionProvider,
    SectionProviderMapping, SegmentedSectionProvider,
};

fn section(count: usize) -> Arc<ArraySection<usize>> {
    Arc::new(ArraySection::from_vec((0..count).collect()))
}

struct Outputs {
    changesets: Arc<Mutex<Vec<Changeset>>>,
    reloads: Arc<Mutex<usize>>,
}

fn observe(recorder: &ChangeRecorder) -> Outputs {
    let changesets = Arc::new(Mutex::new(Vec::new()));
    let sink = changesets.clone();
    recorder
        .changeset_ready()
        .connect(move |changeset| sink.lock().push(changeset.clone()));

    let reloads = Arc::new(Mutex::new(0));
    let counter = reloads.clone();
    recorder.invalidated().connect(move |_| *counter.lock() += 1);

    Outputs { changesets, reloads }
}

#[test]
fn test_first_child_is_selected() {
    let segments = SegmentedSectionProvider::new();
    assert_eq!(segments.current_index(), None);
    assert_eq!(segments.number_of_sections(), 0);

    segments.append_section(section(2));
    segments.append_section(section(5));

    assert_eq!(segments.current_index(), Some(0));
    assert_eq!(segments.number_of_sections(), 1);
    assert_eq!(segments.sections()[0].number_of_elements(), 2);
}

#[test]
fn test_switching_segments_reloads() {
    let first = section(2);
    let second = section(5);
    let segments = SegmentedSectionProvider::new();
    segments.append_section(first.clone());
    segments.append_section(second.clone());

    let root = ComposedSectionProvider::new();
    root.append_section(section(1));
    root.append_provider(segments.clone());

    let mapping = SectionProviderMapping::new(root);
    let recorder = ChangeRecorder::attach(&mapping);
    let outputs = observe(&recorder);

    segments.set_current_index(Some(1));

    assert_eq!(*outputs.reloads.lock(), 1);
    assert!(outputs.changesets.lock().is_empty());
    assert_eq!(mapping.number_of_sections(), 2);
    assert_eq!(mapping.number_of_elements(1), 5);

    assert_eq!(mapping.section_index(second.id()), Some(1));
    assert_eq!(mapping.section_index(first.id()), None);
}

#[test]
fn test_selecting_the_current_segment_still_reloads() {
    let segments = SegmentedSectionProvider::new();
    segments.append_section(section(1));
    let mapping = SectionProviderMapping::new(segments.clone());
    let recorder = ChangeRecorder::attach(&mapping);
    let outputs = observe(&recorder);

    segments.set_current_index(Some(0));
    segments.set_current_index(None);

    assert_eq!(*outputs.reloads.lock(), 2);
    assert_eq!(mapping.number_of_sections(), 0);
}

#[test]
fn test_hidden_section_changes_are_silent() {
    let visible = section(2);
    let hidden = section(3);
    let segments = SegmentedSectionProvider::new();
    segments.append_section(visible.clone());
    segments.append_section(hidden.clone());

    let mapping = SectionProviderMapping::new(segments.clone());
    let recorder = ChangeRecorder::attach(&mapping);
    let outputs = observe(&recorder);

    hidden.append(9);
    hidden.remove(0);

    assert!(outputs.changesets.lock().is_empty());
    assert_eq!(*outputs.reloads.lock(), 0);

    visible.append(7);
    let changesets = outputs.changesets.lock();
    assert_eq!(changesets.len(), 1);
    assert_eq!(changesets[0].elements_inserted().len(), 1);
}

#[test]
fn test_hidden_provider_changes_are_not_described() {
    let hidden = ComposedSectionProvider::new();
    let segments = SegmentedSectionProvider::new();
    segments.append_section(section(2));
    segments.append_provider(hidden.clone());

    let mapping = SectionProviderMapping::new(segments.clone());
    let recorder = ChangeRecorder::attach(&mapping);
    let outputs = observe(&recorder);

    hidden.append_section(section(4));
    hidden.remove_at(0);

    assert_eq!(*outputs.reloads.lock(), 0);
    assert!(outputs.changesets.lock().iter().all(Changeset::is_empty));
    assert_eq!(mapping.number_of_sections(), 1);
}

#[test]
fn test_removing_the_visible_segment_selects_the_previous() {
    let segments = SegmentedSectionProvider::new();
    segments.append_section(section(1));
    segments.append_section(section(2));
    segments.append_section(section(3));
    segments.set_current_index(Some(2));

    let mapping = SectionProviderMapping::new(segments.clone());
    let recorder = ChangeRecorder::attach(&mapping);
    let outputs = observe(&recorder);

    segments.remove_at(2);
    assert_eq!(segments.current_index(), Some(1));
    assert_eq!(mapping.number_of_elements(0), 2);
    assert_eq!(*outputs.reloads.lock(), 1);

    segments.remove_at(0);
    assert_eq!(segments.current_index(), Some(0));
    assert_eq!(mapping.number_of_elements(0), 2);
    assert_eq!(*outputs.reloads.lock(), 1);
}
