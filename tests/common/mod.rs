//! Shared fixtures for the integration tests
//!
//! A company file has a header line, one line per employee and a footer:
//!
//! ```text
//! H;Nabu;Organizational
//! E;John0;Doe;31
//! ...
//! F;Nabu HQ;BE666-66-66
//! ```

#![allow(dead_code)]

use flatbind::prelude::*;
use std::rc::Rc;

/// Ages of the 24 employees of the sample company
pub const AGES: [i64; 24] = [
    31, 57, 25, 42, 38, 29, 51, 33, 47, 26, 60, 35, 39, 48, 44, 27, 53, 36, 41, 30, 58, 45, 31, 31,
];

pub fn employee_type() -> Rc<ComplexType> {
    Rc::new(
        ComplexType::new("employee")
            .scalar("firstName", ScalarKind::String)
            .scalar("lastName", ScalarKind::String)
            .scalar("age", ScalarKind::Integer),
    )
}

pub fn company_type() -> Rc<ComplexType> {
    Rc::new(
        ComplexType::new("company")
            .scalar("name", ScalarKind::String)
            .scalar("unit", ScalarKind::String)
            .list("employees", employee_type())
            .scalar("address", ScalarKind::String)
            .scalar("billingNumber", ScalarKind::String),
    )
}

pub fn types() -> TypeRegistry {
    let company = company_type();
    let companies = Rc::new(ComplexType::new("companies").list("companies", company));
    TypeRegistry::new().with(companies)
}

pub const COMPANY_BINDING: &str = r#"{
    "record": "company",
    "children": [
        { "record": { "name": "company", "complexType": "company", "children": [
            { "record": { "description": "header", "separator": "\\n", "children": [
                { "field": { "fixed": "H", "separator": ";" } },
                { "field": { "map": "name", "separator": ";" } },
                { "field": { "map": "unit" } }
            ] } },
            { "record": { "map": "employees", "separator": "\\n", "minOccurs": 1, "maxOccurs": 0, "children": [
                { "field": { "fixed": "E", "separator": ";" } },
                { "field": { "map": "firstName", "separator": ";" } },
                { "field": { "map": "lastName", "separator": ";" } },
                { "field": { "map": "age", "match": "[0-9]+" } }
            ] } },
            { "record": { "description": "footer", "separator": "\\n", "children": [
                { "field": { "fixed": "F", "separator": ";" } },
                { "field": { "map": "address", "separator": ";" } },
                { "field": { "map": "billingNumber" } }
            ] } }
        ] } },
        { "record": { "name": "companies", "complexType": "companies", "children": [
            { "record": { "map": "companies", "parent": "company", "maxOccurs": 0 } }
        ] } }
    ]
}"#;

pub fn binding() -> FlatBinding {
    let config = BindingConfig::from_json(COMPANY_BINDING).unwrap();
    FlatBinding::new(config, &types()).unwrap()
}

pub fn header() -> String {
    "H;Nabu;Organizational\n".to_string()
}

pub fn employee_lines() -> String {
    AGES.iter()
        .enumerate()
        .map(|(i, age)| format!("E;John{};Doe;{}\n", i, age))
        .collect()
}

pub fn footer() -> String {
    "F;Nabu HQ;BE666-66-66\n".to_string()
}

/// The complete sample company
pub fn company_file() -> String {
    format!("{}{}{}", header(), employee_lines(), footer())
}
