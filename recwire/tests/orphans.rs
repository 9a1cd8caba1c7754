use recwire::message::{self, AllocationStrategy, HeapAllocator, ReaderOptions};
use recwire::{recursive_serde, serialize, struct_list, ErrorKind};

type PairList<'a> = struct_list::Builder<'a, recursive_serde::Owned>;

fn slot_word(segment: &[u8], index: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&segment[index * 8..(index + 1) * 8]);
    u64::from_le_bytes(raw)
}

#[test]
fn disown_then_adopt_moves_without_copying() {
    let mut message = message::Builder::new_default();
    let mut pair = message.initn_root::<PairList>(2).unwrap();
    pair.reborrow()
        .get(0)
        .unwrap()
        .set_nonrecursive_blob(b"moving bytes")
        .unwrap();

    let before = pair
        .reborrow()
        .get(0)
        .unwrap()
        .into_reader()
        .get_nonrecursive_blob()
        .unwrap()
        .as_ptr();

    let mut orphan = pair.reborrow().get(0).unwrap().disown_nonrecursive_blob().unwrap();
    assert!(!orphan.is_null());
    assert!(!pair.reborrow().get(0).unwrap().has_nonrecursive_blob());

    let mut second = pair.reborrow().get(1).unwrap();
    second.adopt_nonrecursive_blob(&mut orphan).unwrap();
    assert!(orphan.is_consumed());

    let blob = second.into_reader().get_nonrecursive_blob().unwrap();
    assert_eq!(blob, b"moving bytes");
    assert_eq!(blob.as_ptr(), before);
}

#[test]
fn second_adopt_fails() {
    let mut message = message::Builder::new_default();
    let mut pair = message.initn_root::<PairList>(2).unwrap();
    pair.reborrow()
        .get(0)
        .unwrap()
        .set_fully_qualified_name("a.B")
        .unwrap();

    let mut orphan = pair
        .reborrow()
        .get(0)
        .unwrap()
        .disown_fully_qualified_name()
        .unwrap();
    pair.reborrow()
        .get(1)
        .unwrap()
        .adopt_fully_qualified_name(&mut orphan)
        .unwrap();

    let err = pair
        .reborrow()
        .get(0)
        .unwrap()
        .adopt_fully_qualified_name(&mut orphan)
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyAdopted);

    let list = pair.into_reader();
    assert!(!list.get(0).unwrap().has_fully_qualified_name());
    assert_eq!(
        list.get(1).unwrap().get_fully_qualified_name().unwrap(),
        "a.B"
    );
}

#[test]
fn disown_never_set_blob() {
    let mut message = message::Builder::new_default();
    let mut root = message.init_root::<recursive_serde::Builder>().unwrap();
    let mut orphan = root.disown_nonrecursive_blob().unwrap();
    assert!(orphan.is_null());
    assert!(!root.has_nonrecursive_blob());

    root.set_nonrecursive_blob(b"kept").unwrap();
    root.adopt_nonrecursive_blob(&mut orphan).unwrap();
    assert!(!root.has_nonrecursive_blob());
    assert!(root.into_reader().get_nonrecursive_blob().unwrap().is_empty());
}

#[test]
fn orphan_reader_sees_content() {
    let mut message = message::Builder::new_default();
    {
        let mut root = message.init_root::<recursive_serde::Builder>().unwrap();
        let mut names = root.reborrow().init_fields_name(2).unwrap();
        names.set(0, "alpha").unwrap();
        names.set(1, "beta").unwrap();
    }
    let orphan = message
        .get_root::<recursive_serde::Builder>()
        .unwrap()
        .disown_fields_name()
        .unwrap();
    let names = orphan.get_reader(&message).unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names.get(1).unwrap(), "beta");
}

#[test]
fn adopt_from_another_message_fails() {
    let mut other = message::Builder::new_default();
    let mut orphan = other.get_orphanage().new_orphan_data(b"elsewhere").unwrap();

    let mut message = message::Builder::new_default();
    let mut root = message.init_root::<recursive_serde::Builder>().unwrap();
    let err = root.adopt_nonrecursive_blob(&mut orphan).unwrap_err();
    assert_eq!(err.kind, ErrorKind::OrphanFromDifferentMessage);
    assert!(!orphan.is_consumed());
}

fn small_segments() -> message::Builder<HeapAllocator> {
    message::Builder::new(
        HeapAllocator::new()
            .first_segment_words(5)
            .allocation_strategy(AllocationStrategy::FixedSize),
    )
}

#[test]
fn adopt_across_segments_writes_far_pointer() {
    let mut message = small_segments();
    // Root pointer plus the four pointer slots fill the first segment.
    message.init_root::<recursive_serde::Builder>().unwrap();
    let mut orphan = message.get_orphanage().new_orphan_data(b"far away").unwrap();
    message
        .get_root::<recursive_serde::Builder>()
        .unwrap()
        .adopt_nonrecursive_blob(&mut orphan)
        .unwrap();

    let segments = message.get_segments_for_output();
    assert_eq!(segments.len(), 2);
    let slot = slot_word(segments[0], 4);
    assert_eq!(slot & 0b111, 0b010);
    assert_eq!(slot >> 32, 1);

    let words = serialize::write_message_to_words(&message);
    let mut bytes = recwire::Word::words_to_bytes(&words);
    let reader = serialize::read_message_from_flat_slice(&mut bytes, ReaderOptions::new()).unwrap();
    let root = reader.get_root::<recursive_serde::Reader>().unwrap();
    assert_eq!(root.get_nonrecursive_blob().unwrap(), b"far away");
}

#[test]
fn adopt_into_full_segment_writes_double_far() {
    let mut message = small_segments();
    message.init_root::<recursive_serde::Builder>().unwrap();
    // Fills a whole segment, leaving no room for a landing pad beside it.
    let mut orphan = message.get_orphanage().new_orphan_data(&[7u8; 40]).unwrap();
    message
        .get_root::<recursive_serde::Builder>()
        .unwrap()
        .adopt_nonrecursive_blob(&mut orphan)
        .unwrap();

    let segments = message.get_segments_for_output();
    assert_eq!(segments.len(), 3);
    let slot = slot_word(segments[0], 4);
    assert_eq!(slot & 0b111, 0b110);
    assert_eq!(slot >> 32, 2);

    let reader = message.get_root_as_reader::<recursive_serde::Reader>().unwrap();
    assert_eq!(reader.get_nonrecursive_blob().unwrap(), &[7u8; 40][..]);
}

#[test]
fn disown_through_far_pointer_then_readopt() {
    let mut message = small_segments();
    message.init_root::<recursive_serde::Builder>().unwrap();
    let mut orphan = message.get_orphanage().new_orphan_text("remote").unwrap();
    let mut root = message.get_root::<recursive_serde::Builder>().unwrap();
    root.adopt_fully_qualified_name(&mut orphan).unwrap();

    let mut moved = root.disown_fully_qualified_name().unwrap();
    assert!(!root.has_fully_qualified_name());
    root.adopt_fully_qualified_name(&mut moved).unwrap();
    assert_eq!(
        root.into_reader().get_fully_qualified_name().unwrap(),
        "remote"
    );
}
