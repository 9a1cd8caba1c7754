use recwire::message::{self, ReaderOptions};
use recwire::private::layout::StructSize;
use recwire::schema::{DefaultValue, Field, FieldKind, PrimitiveKind, StructSchema};
use recwire::{any_pointer, recursive_serde, serialize, text, text_list};

// The same type after a later revision added a data field and a fifth pointer.
static NEWER: StructSchema = StructSchema {
    type_id: recursive_serde::TYPE_ID,
    name: "RecursiveSerde",
    struct_size: StructSize {
        data: 1,
        pointers: 5,
    },
    fields: &[
        Field {
            name: "fieldsName",
            index: 0,
            kind: FieldKind::TextList,
            default: DefaultValue::None,
        },
        Field {
            name: "fieldsData",
            index: 1,
            kind: FieldKind::DataList,
            default: DefaultValue::None,
        },
        Field {
            name: "fullyQualifiedName",
            index: 2,
            kind: FieldKind::Text,
            default: DefaultValue::None,
        },
        Field {
            name: "nonrecursiveBlob",
            index: 3,
            kind: FieldKind::Data,
            default: DefaultValue::None,
        },
        Field {
            name: "revision",
            index: 0,
            kind: FieldKind::Primitive(PrimitiveKind::UInt32),
            default: DefaultValue::None,
        },
        Field {
            name: "comment",
            index: 4,
            kind: FieldKind::Text,
            default: DefaultValue::None,
        },
    ],
};

// An early revision that only had the first field.
static OLDER: StructSchema = StructSchema {
    type_id: recursive_serde::TYPE_ID,
    name: "RecursiveSerde",
    struct_size: StructSize {
        data: 0,
        pointers: 1,
    },
    fields: &[Field {
        name: "fieldsName",
        index: 0,
        kind: FieldKind::TextList,
        default: DefaultValue::None,
    }],
};

fn to_words<A: message::Allocator>(message: &message::Builder<A>) -> Vec<recwire::Word> {
    serialize::write_message_to_words(message)
}

#[test]
fn newer_writer_older_reader() {
    let mut message = message::Builder::new_default();
    {
        let mut root = message
            .init_root::<any_pointer::Builder>()
            .unwrap()
            .init_dynamic(&NEWER);
        root.set_named("fullyQualifiedName", "v2.Type".into()).unwrap();
        root.set_named("revision", 3u32.into()).unwrap();
        root.set_named("comment", "added later".into()).unwrap();
        let mut names = root
            .reborrow()
            .initn_named("fieldsName", 1)
            .unwrap()
            .downcast::<text_list::Builder>();
        names.set(0, "x").unwrap();
    }

    let words = to_words(&message);
    let mut bytes = recwire::Word::words_to_bytes(&words);
    let reader = serialize::read_message_from_flat_slice(&mut bytes, ReaderOptions::new()).unwrap();

    let root = reader.get_root::<recursive_serde::Reader>().unwrap();
    assert_eq!(root.get_fully_qualified_name().unwrap(), "v2.Type");
    assert_eq!(root.get_fields_name().unwrap().get(0).unwrap(), "x");
    assert!(!root.has_nonrecursive_blob());

    // The newer fields are still there for a reader that knows them.
    let dynamic = reader
        .get_root::<any_pointer::Reader>()
        .unwrap()
        .get_dynamic(&NEWER)
        .unwrap();
    assert_eq!(dynamic.get_named("revision").unwrap().downcast::<u32>(), 3);
    assert_eq!(
        dynamic.get_named("comment").unwrap().downcast::<text::Reader>(),
        "added later"
    );
}

#[test]
fn older_writer_newer_reader() {
    let mut message = message::Builder::new_default();
    {
        let root = message
            .init_root::<any_pointer::Builder>()
            .unwrap()
            .init_dynamic(&OLDER);
        let mut names = root
            .initn_named("fieldsName", 2)
            .unwrap()
            .downcast::<text_list::Builder>();
        names.set(0, "alpha").unwrap();
        names.set(1, "beta").unwrap();
    }
    let words = to_words(&message);
    let mut bytes = recwire::Word::words_to_bytes(&words);
    let reader = serialize::read_message_from_flat_slice(&mut bytes, ReaderOptions::new()).unwrap();
    let root = reader.get_root::<recursive_serde::Reader>().unwrap();

    assert_eq!(root.get_fields_name().unwrap().len(), 2);
    assert!(!root.has_fields_data());
    assert!(!root.has_fully_qualified_name());
    assert!(!root.has_nonrecursive_blob());
    assert!(root.get_fields_data().unwrap().is_empty());
    assert!(root.get_fully_qualified_name().unwrap().is_empty());
    assert!(root.get_nonrecursive_blob().unwrap().is_empty());
}

#[test]
fn builder_upgrades_older_struct() {
    let mut message = message::Builder::new_default();
    {
        let root = message
            .init_root::<any_pointer::Builder>()
            .unwrap()
            .init_dynamic(&OLDER);
        let mut names = root
            .initn_named("fieldsName", 1)
            .unwrap()
            .downcast::<text_list::Builder>();
        names.set(0, "kept").unwrap();
    }

    let mut root = message.get_root::<recursive_serde::Builder>().unwrap();
    root.set_nonrecursive_blob(b"new slot").unwrap();

    let root = root.into_reader();
    assert_eq!(root.get_fields_name().unwrap().get(0).unwrap(), "kept");
    assert_eq!(root.get_nonrecursive_blob().unwrap(), b"new slot");
}
