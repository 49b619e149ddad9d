//! Shared fixtures for pb-partial integration tests.
//!
//! Payloads are written by hand with `CodedOutputStream` so that they carry
//! every field of the full schema, including the ones a partial decoder is
//! expected to skip.

#![allow(dead_code)]

use proto_schema::ProtoSchema;
use protobuf::reflect::MessageDescriptor;
use protobuf::CodedOutputStream;

pub const ADDRESS_BOOK_PROTO: &str = r#"
    syntax = "proto3";
    package tutorial;

    message Person {
        string name = 1;
        string id = 2;
        string email = 3;

        enum PhoneType {
            MOBILE = 0;
            HOME = 1;
            WORK = 2;
        }

        message PhoneNumber {
            string number = 1;
            PhoneType type = 2;
        }

        repeated PhoneNumber phones = 4;
        map<string, string> labels = 5;
        map<string, PhoneNumber> contacts = 6;
        optional int64 last_seen = 7;
    }

    message AddressBook {
        repeated Person people = 1;
        Person owner = 2;
    }
"#;

pub const PHONE_MOBILE: i32 = 0;
pub const PHONE_HOME: i32 = 1;
pub const PHONE_WORK: i32 = 2;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pb_partial=debug".into()),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn address_book_schema() -> ProtoSchema {
    ProtoSchema::from_string(ADDRESS_BOOK_PROTO).expect("Failed to parse address book proto")
}

pub fn address_book() -> MessageDescriptor {
    address_book_schema()
        .get_message("tutorial.AddressBook")
        .expect("AddressBook not found")
}

pub fn encode(build: impl FnOnce(&mut CodedOutputStream)) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut os = CodedOutputStream::vec(&mut buf);
        build(&mut os);
        os.flush().expect("Failed to flush output stream");
    }
    buf
}

pub fn encode_phone(number: &str, phone_type: i32) -> Vec<u8> {
    encode(|os| {
        os.write_string(1, number).unwrap();
        os.write_enum(2, phone_type).unwrap();
    })
}

/// A person with every field populated.
pub struct PersonFixture<'a> {
    pub name: &'a str,
    pub id: &'a str,
    pub email: &'a str,
    pub phones: Vec<(&'a str, i32)>,
    pub labels: Vec<(&'a str, &'a str)>,
    pub contacts: Vec<(&'a str, &'a str, i32)>,
    pub last_seen: i64,
}

impl PersonFixture<'_> {
    pub fn encode(&self) -> Vec<u8> {
        encode(|os| {
            os.write_string(1, self.name).unwrap();
            os.write_string(2, self.id).unwrap();
            os.write_string(3, self.email).unwrap();
            for (number, phone_type) in &self.phones {
                os.write_bytes(4, &encode_phone(number, *phone_type)).unwrap();
            }
            for (key, value) in &self.labels {
                let entry = encode(|entry| {
                    entry.write_string(1, key).unwrap();
                    entry.write_string(2, value).unwrap();
                });
                os.write_bytes(5, &entry).unwrap();
            }
            for (key, number, phone_type) in &self.contacts {
                let entry = encode(|entry| {
                    entry.write_string(1, key).unwrap();
                    entry
                        .write_bytes(2, &encode_phone(number, *phone_type))
                        .unwrap();
                });
                os.write_bytes(6, &entry).unwrap();
            }
            os.write_int64(7, self.last_seen).unwrap();
        })
    }
}

pub fn alice() -> PersonFixture<'static> {
    PersonFixture {
        name: "Alice",
        id: "p-1",
        email: "alice@example.com",
        phones: vec![("555-0100", PHONE_MOBILE), ("555-0101", PHONE_WORK)],
        labels: vec![("team", "infra"), ("city", "Lisbon")],
        contacts: vec![("bob", "555-0200", PHONE_HOME)],
        last_seen: 1_700_000_000,
    }
}

pub fn bob() -> PersonFixture<'static> {
    PersonFixture {
        name: "Bob",
        id: "p-2",
        email: "bob@example.com",
        phones: vec![("555-0200", PHONE_HOME)],
        labels: vec![("team", "data")],
        contacts: Vec::new(),
        last_seen: 1_700_000_500,
    }
}

/// An address book holding `people`, with `owner` set to the first of them.
pub fn encode_address_book(people: &[PersonFixture<'_>]) -> Vec<u8> {
    encode(|os| {
        for person in people {
            os.write_bytes(1, &person.encode()).unwrap();
        }
        if let Some(owner) = people.first() {
            os.write_bytes(2, &owner.encode()).unwrap();
        }
    })
}
