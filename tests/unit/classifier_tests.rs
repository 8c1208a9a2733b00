//! Unit tests for turning raw notifications into audit events
#[cfg(test)]
mod tests {
    use fim::monitor::watcher::{ClassifiedEvent, EventClassifier};
    use fim::WatchEventKind;
    use notify::event::{
        AccessKind, CreateKind, DataChange, EventKind, ModifyKind, RemoveKind, RenameMode,
    };
    use notify::Event;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&PathBuf]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |ev, path| ev.add_path((*path).clone()))
    }

    fn kinds(events: &[ClassifiedEvent]) -> Vec<WatchEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn create_and_remove_by_kind() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        let dir = temp_dir.path().join("d");
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(EventKind::Create(CreateKind::File), &[&file]));
        assert_eq!(kinds(&out), vec![WatchEventKind::FileCreated]);
        assert_eq!(out[0].path, file);

        let out = classifier.classify(&event(EventKind::Create(CreateKind::Folder), &[&dir]));
        assert_eq!(kinds(&out), vec![WatchEventKind::DirectoryCreated]);

        // A remove with no kind info is resolved from directories seen before.
        let out = classifier.classify(&event(EventKind::Remove(RemoveKind::Any), &[&dir]));
        assert_eq!(kinds(&out), vec![WatchEventKind::DirectoryDeleted]);

        let out = classifier.classify(&event(EventKind::Remove(RemoveKind::File), &[&file]));
        assert_eq!(kinds(&out), vec![WatchEventKind::FileDeleted]);
    }

    #[test]
    fn create_any_checks_the_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("fresh");
        fs::create_dir(&dir).unwrap();
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(EventKind::Create(CreateKind::Any), &[&dir]));

        assert_eq!(kinds(&out), vec![WatchEventKind::DirectoryCreated]);
    }

    #[test]
    fn data_change_is_modification() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, b"x").unwrap();
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &[&file],
        ));

        assert_eq!(kinds(&out), vec![WatchEventKind::FileModified]);
    }

    #[test]
    fn access_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(EventKind::Access(AccessKind::Any), &[&file]));

        assert!(out.is_empty());
    }

    #[test]
    fn from_to_both_sequence_is_one_move() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("old.txt");
        let to = temp_dir.path().join("new.txt");
        fs::write(&to, b"x").unwrap();
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[&from],
        ));
        assert!(out.is_empty());
        assert!(classifier.has_pending());

        let out = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[&to],
        ));
        assert_eq!(
            out,
            vec![ClassifiedEvent {
                kind: WatchEventKind::FileMoved,
                path: from.clone(),
                destination: Some(to.clone()),
            }]
        );

        let out = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&from, &to],
        ));
        assert!(out.is_empty(), "Both after a paired From/To is a duplicate");
        assert!(!classifier.has_pending());
    }

    #[test]
    fn both_alone_is_a_move() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("old");
        let to = temp_dir.path().join("new");
        fs::create_dir(&to).unwrap();
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&from, &to],
        ));

        assert_eq!(kinds(&out), vec![WatchEventKind::DirectoryMoved]);
        assert_eq!(out[0].destination.as_ref(), Some(&to));
    }

    #[test]
    fn unpaired_from_flushes_as_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("left.txt");
        let mut classifier = EventClassifier::default();

        classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[&from],
        ));
        let out = classifier.flush();

        assert_eq!(kinds(&out), vec![WatchEventKind::FileDeleted]);
        assert_eq!(out[0].path, from);
        assert!(!classifier.has_pending());
        assert!(classifier.flush().is_empty());
    }

    #[test]
    fn unrelated_event_flushes_pending_from_first() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("left.txt");
        let other = temp_dir.path().join("other.txt");
        let mut classifier = EventClassifier::default();

        classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[&from],
        ));
        let out = classifier.classify(&event(EventKind::Create(CreateKind::File), &[&other]));

        assert_eq!(
            kinds(&out),
            vec![WatchEventKind::FileDeleted, WatchEventKind::FileCreated]
        );
    }

    #[test]
    fn unpaired_to_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let to = temp_dir.path().join("arrived.txt");
        fs::write(&to, b"x").unwrap();
        let mut classifier = EventClassifier::default();

        let out = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[&to],
        ));

        assert_eq!(kinds(&out), vec![WatchEventKind::FileCreated]);
    }

    #[test]
    fn rename_any_pairs_by_existence() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("gone.txt");
        let to = temp_dir.path().join("here.txt");
        fs::write(&to, b"x").unwrap();
        let mut classifier = EventClassifier::default();

        let first = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &[&from],
        ));
        let second = classifier.classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &[&to],
        ));

        assert!(first.is_empty());
        assert_eq!(kinds(&second), vec![WatchEventKind::FileMoved]);
        assert_eq!(second[0].path, from);
    }
}
