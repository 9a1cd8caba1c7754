use recwire::message;
use recwire::{data_list, primitive_list, recursive_serde, struct_list, text_list, ErrorKind};

#[test]
fn primitive_list_set_and_iterate() {
    let mut message = message::Builder::new_default();
    {
        let mut list = message.initn_root::<primitive_list::Builder<u16>>(4).unwrap();
        for i in 0..4 {
            list.set(i, (i as u16 + 1) * 1000).unwrap();
        }
        assert_eq!(list.get(3).unwrap(), 4000);
        assert_eq!(list.set(4, 1).unwrap_err().kind, ErrorKind::IndexOutOfBounds);
    }
    let list = message
        .get_root_as_reader::<primitive_list::Reader<u16>>()
        .unwrap();
    assert_eq!(list.iter().rev().collect::<Vec<_>>(), [4000, 3000, 2000, 1000]);
    assert_eq!(list.get(4).unwrap_err().kind, ErrorKind::IndexOutOfBounds);
    assert_eq!(list.try_get(4), None);
}

#[test]
fn bool_list_packs_bits() {
    let mut message = message::Builder::new_default();
    {
        let mut list = message.initn_root::<primitive_list::Builder<bool>>(10).unwrap();
        list.set(0, true).unwrap();
        list.set(9, true).unwrap();
    }
    // One pointer word plus one word of bits.
    assert_eq!(message.size_in_words(), 2);
    let list = message
        .get_root_as_reader::<primitive_list::Reader<bool>>()
        .unwrap();
    let set: Vec<u32> = (0..list.len()).filter(|&i| list.get(i).unwrap()).collect();
    assert_eq!(set, [0, 9]);
}

#[test]
fn wider_elements_read_through_narrower_view() {
    let mut message = message::Builder::new_default();
    {
        let mut list = message.initn_root::<primitive_list::Builder<u32>>(2).unwrap();
        list.set(0, 0x0102_0304).unwrap();
        list.set(1, 0x0a0b_0c0d).unwrap();
    }
    let narrow = message
        .get_root_as_reader::<primitive_list::Reader<u8>>()
        .unwrap();
    assert_eq!(narrow.iter().collect::<Vec<_>>(), [0x04, 0x0d]);

    let err = message
        .get_root_as_reader::<primitive_list::Reader<u64>>()
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::CorruptPointer);
    let err = message
        .get_root_as_reader::<primitive_list::Reader<bool>>()
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::CorruptPointer);
}

#[test]
fn blob_list_shape_mismatch() {
    let mut message = message::Builder::new_default();
    {
        let mut list = message.initn_root::<data_list::Builder>(1).unwrap();
        list.set(0, &[1, 2, 3]).unwrap();
    }
    let err = message
        .get_root_as_reader::<primitive_list::Reader<u32>>()
        .err()
        .unwrap();
    assert_eq!(err.kind, ErrorKind::CorruptPointer);

    // Data elements lack the NUL terminator text requires.
    let as_text = message.get_root_as_reader::<text_list::Reader>().unwrap();
    assert_eq!(as_text.get(0).unwrap_err().kind, ErrorKind::CorruptPointer);
}

#[test]
fn struct_list_of_records() {
    let mut message = message::Builder::new_default();
    {
        let mut list = message
            .initn_root::<struct_list::Builder<recursive_serde::Owned>>(3)
            .unwrap();
        for i in 0..3 {
            let name = format!("record.{i}");
            list.reborrow()
                .get(i)
                .unwrap()
                .set_fully_qualified_name(name.as_str())
                .unwrap();
        }
        assert!(list.reborrow().get(3).is_err());
    }
    let list = message
        .get_root_as_reader::<struct_list::Reader<recursive_serde::Owned>>()
        .unwrap();
    assert_eq!(list.len(), 3);
    let names: Vec<String> = list
        .iter()
        .map(|r| r.get_fully_qualified_name().unwrap().to_string().unwrap())
        .collect();
    assert_eq!(names, ["record.0", "record.1", "record.2"]);
    assert!(list.try_get(3).is_none());
}

#[test]
fn data_list_iterates_in_order() {
    let mut message = message::Builder::new_default();
    let mut orphan = message
        .get_orphanage()
        .new_orphan_data_list(&[b"one", b"", b"three"])
        .unwrap();
    let mut root = message.init_root::<recursive_serde::Builder>().unwrap();
    root.adopt_fields_data(&mut orphan).unwrap();

    let data = root.into_reader().get_fields_data().unwrap();
    let lens: Vec<usize> = data.iter().map(|d| d.unwrap().len()).collect();
    assert_eq!(lens, [3, 0, 5]);
    assert_eq!(data.iter().len(), 3);
}
