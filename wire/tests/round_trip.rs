//! Writer/reader round trip over framed messages
//!
//! Values written with static types and read back with the same types must
//! come out unchanged, including after the message has been framed into
//! bytes and parsed again.

use bus_types::ObjectPath;
use proptest::prelude::*;
use std::collections::BTreeMap;
use wire::{Message, Variant};

fn framed(msg: &Message) -> Message {
    Message::decode(&msg.encode()).unwrap()
}

fn carrier() -> Message {
    Message::signal(ObjectPath::root(), "org.example.RoundTrip", "Carry").unwrap()
}

proptest! {
    #[test]
    fn prop_primitives_round_trip(
        b in any::<bool>(),
        y in any::<u8>(),
        n in any::<i16>(),
        q in any::<u16>(),
        i in any::<i32>(),
        u in any::<u32>(),
        x in any::<i64>(),
        t in any::<u64>(),
        s in "[^\\x00]{0,64}",
    ) {
        let mut msg = carrier();
        msg.writer()
            .write(&b)
            .write(&y)
            .write(&n)
            .write(&q)
            .write(&i)
            .write(&u)
            .write(&x)
            .write(&t)
            .write(&s);
        let msg = framed(&msg);
        let mut reader = msg.reader();
        prop_assert_eq!(reader.read::<bool>().unwrap(), b);
        prop_assert_eq!(reader.read::<u8>().unwrap(), y);
        prop_assert_eq!(reader.read::<i16>().unwrap(), n);
        prop_assert_eq!(reader.read::<u16>().unwrap(), q);
        prop_assert_eq!(reader.read::<i32>().unwrap(), i);
        prop_assert_eq!(reader.read::<u32>().unwrap(), u);
        prop_assert_eq!(reader.read::<i64>().unwrap(), x);
        prop_assert_eq!(reader.read::<u64>().unwrap(), t);
        prop_assert_eq!(reader.read::<String>().unwrap(), s);
        prop_assert!(reader.finish().is_ok());
    }

    #[test]
    fn prop_sequences_and_tuples_round_trip(
        items in proptest::collection::vec((any::<u8>(), any::<i64>(), "[a-z]{0,8}"), 0..16),
        nested in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 0..4), 0..4),
        map in proptest::collection::btree_map("[a-z]{1,6}", any::<i32>(), 0..8),
    ) {
        let mut msg = carrier();
        msg.writer().write(&items).write(&nested).write(&map);
        let msg = framed(&msg);
        let mut reader = msg.reader();
        prop_assert_eq!(reader.read::<Vec<(u8, i64, String)>>().unwrap(), items);
        prop_assert_eq!(reader.read::<Vec<Vec<bool>>>().unwrap(), nested);
        prop_assert_eq!(reader.read::<BTreeMap<String, i32>>().unwrap(), map);
        prop_assert!(reader.finish().is_ok());
    }

    #[test]
    fn prop_variant_round_trip(value in any::<i64>(), label in "[A-Za-z]{0,12}") {
        let mut msg = carrier();
        msg.writer()
            .write(&Variant::new(&value))
            .write(&Variant::new(&(label.clone(), value)));
        let msg = framed(&msg);
        let mut reader = msg.reader();
        prop_assert_eq!(reader.read::<Variant>().unwrap().get::<i64>().unwrap(), value);
        prop_assert_eq!(
            reader.read::<Variant>().unwrap().get::<(String, i64)>().unwrap(),
            (label, value)
        );
    }
}

#[test]
fn test_nested_struct_alignment_survives_framing() {
    let value = (1u8, (2u16, vec![(3i64, true)]), "end".to_string());
    let mut msg = carrier();
    msg.writer().write(&value).write(&9u8);
    let msg = framed(&msg);
    let mut reader = msg.reader();
    assert_eq!(
        reader.read::<(u8, (u16, Vec<(i64, bool)>), String)>().unwrap(),
        value
    );
    assert_eq!(reader.read::<u8>().unwrap(), 9);
    reader.finish().unwrap();
}
