//! Integration tests for marshalling
//!
//! These tests cover:
//! - Writing parsed documents back unchanged
//! - Padding and truncation of fixed-length fields
//! - Content built in code
//! - Charsets and writers

mod common;

use common::*;
use flatbind::prelude::*;
use std::rc::Rc;

fn person() -> Rc<ComplexType> {
    Rc::new(
        ComplexType::new("person")
            .scalar("name", ScalarKind::String)
            .scalar("age", ScalarKind::Integer),
    )
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn test_company_round_trip() {
    let text = company_file();
    let binding = binding();
    let content = binding.unmarshal_str(&text).unwrap();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), text);
}

#[test]
fn test_companies_round_trip() {
    let text = format!("{}{}", company_file(), company_file());
    let binding = binding().named("companies").unwrap();
    let content = binding.unmarshal_str(&text).unwrap();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), text);
}

#[test]
fn test_marshal_into_writer() {
    let text = company_file();
    let binding = binding();
    let content = binding.unmarshal_str(&text).unwrap();

    let mut out = Vec::new();
    binding.marshal(&mut out, &content).unwrap();
    assert_eq!(out, text.into_bytes());
}

// ============================================================================
// Fixed-Length Fields
// ============================================================================

#[test]
fn test_fixed_length_field_is_padded() {
    let config = BindingConfig::new().child(Field::new().map("name").length(4).left_align());
    let binding = FlatBinding::for_type(config, person()).unwrap();

    let mut content = person().new_instance();
    content.set("name", Value::string("Jo")).unwrap();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), "Jo  ");

    let parsed = binding.unmarshal_str("Jo  ").unwrap();
    assert_eq!(parsed, content);
}

#[test]
fn test_right_aligned_number_is_zero_padded() {
    let config = BindingConfig::new()
        .child(Field::new().map("name").length(6).left_align())
        .child(Field::new().map("age").length(3).pad("0"));
    let binding = FlatBinding::for_type(config, person()).unwrap();

    let mut content = person().new_instance();
    content.set("name", Value::string("Ann")).unwrap();
    content.set("age", Value::Int(7)).unwrap();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), "Ann   007");

    let parsed = binding.unmarshal_str("Ann   007").unwrap();
    assert_eq!(parsed.get("age").and_then(Value::as_int), Some(7));
}

#[test]
fn test_overlong_value_is_truncated() {
    let config = BindingConfig::new().child(Field::new().map("name").length(4).left_align());
    let binding = FlatBinding::for_type(config, person()).unwrap();

    let mut content = person().new_instance();
    content.set("name", Value::string("Johnny")).unwrap();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), "John");
}

#[test]
fn test_missing_values_write_padding() {
    let config = BindingConfig::new().child(
        Record::new()
            .separator("\\n")
            .child(Field::new().fixed("P").separator(";"))
            .child(Field::new().map("name").length(5).left_align().separator(";"))
            .child(Field::new().map("age")),
    );
    let binding = FlatBinding::for_type(config, person()).unwrap();

    let content = person().new_instance();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), "P;     ;\n");
}

// ============================================================================
// Content Built In Code
// ============================================================================

#[test]
fn test_marshal_built_content() {
    let mut company = company_type().new_instance();
    company.set("name", Value::string("Acme")).unwrap();
    company.set("unit", Value::string("Sales")).unwrap();
    company.set("address", Value::string("Main Street")).unwrap();
    company.set("billingNumber", Value::string("42")).unwrap();

    for (first, age) in [("Ann", 31), ("Bob", 45)] {
        let mut employee = employee_type().new_instance();
        employee.set("firstName", Value::string(first)).unwrap();
        employee.set("lastName", Value::string("Smith")).unwrap();
        employee.set("age", Value::Int(age)).unwrap();
        company.push("employees", Value::Record(employee)).unwrap();
    }

    let text = binding().marshal_to_string(&company).unwrap();
    assert_eq!(
        text,
        "H;Acme;Sales\nE;Ann;Smith;31\nE;Bob;Smith;45\nF;Main Street;42\n"
    );

    let parsed = binding().unmarshal_str(&text).unwrap();
    assert_eq!(parsed, company);
}

#[test]
fn test_nested_paths_create_intermediate_records() {
    let address = Rc::new(
        ComplexType::new("address")
            .scalar("street", ScalarKind::String)
            .scalar("city", ScalarKind::String),
    );
    let ty = Rc::new(
        ComplexType::new("customer")
            .scalar("name", ScalarKind::String)
            .complex("address", address),
    );
    let config = BindingConfig::new().child(
        Record::new()
            .separator("\\n")
            .child(Field::new().map("name").separator(";"))
            .child(Field::new().map("address/street").separator(";"))
            .child(Field::new().map("address/city")),
    );
    let binding = FlatBinding::for_type(config, ty).unwrap();

    let content = binding.unmarshal_str("Ann;Main Street 1;Ghent\n").unwrap();
    assert_eq!(
        content.get("address/city").and_then(Value::as_str),
        Some("Ghent")
    );
    assert_eq!(
        binding.marshal_to_string(&content).unwrap(),
        "Ann;Main Street 1;Ghent\n"
    );
}

#[test]
fn test_record_in_scalar_slot_is_rejected() {
    let config = BindingConfig::new().child(Field::new().map("name"));
    let binding = FlatBinding::for_type(config, company_type()).unwrap();

    let mut content = company_type().new_instance();
    content.set("name", Value::string("ok")).unwrap();
    assert_eq!(binding.marshal_to_string(&content).unwrap(), "ok");

    let mut broken = company_type().new_instance();
    broken
        .push("employees", Value::Record(employee_type().new_instance()))
        .unwrap();
    let config = BindingConfig::new().child(Field::new().map("employees").formatter("boolean"));
    let binding = FlatBinding::for_type(config, company_type()).unwrap();
    assert!(matches!(
        binding.marshal_to_string(&broken),
        Err(BindingError::Marshal { .. })
    ));
}

// ============================================================================
// Charsets
// ============================================================================

#[test]
fn test_latin1_round_trip() {
    let config = BindingConfig::new().child(
        Record::new()
            .separator("\\n")
            .child(Field::new().map("name").separator(";"))
            .child(Field::new().map("age")),
    );
    let binding = FlatBinding::for_type(config, person())
        .unwrap()
        .with_charset(Charset::Latin1);

    let mut content = person().new_instance();
    content.set("name", Value::string("Zoë")).unwrap();
    content.set("age", Value::Int(29)).unwrap();

    let mut bytes = Vec::new();
    binding.marshal(&mut bytes, &content).unwrap();
    assert_eq!(bytes, b"Zo\xEB;29\n".to_vec());

    let parsed = binding.unmarshal_reader(bytes.as_slice()).unwrap();
    assert_eq!(parsed, content);
}
