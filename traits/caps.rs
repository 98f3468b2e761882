use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Fraction {
    pub numer: i32,
    pub denom: i32,
}

impl Fraction {
    pub fn new(numer: i32, denom: i32) -> Fraction {
        Fraction { numer, denom }
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Fraction::new(0, 1)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum CapsValue {
    Int(i32),
    Fraction(Fraction),
    Bool(bool),
    Str(String),
}

impl fmt::Display for CapsValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CapsValue::Int(v) => write!(f, "(int){}", v),
            CapsValue::Fraction(v) => write!(f, "(fraction){}", v),
            CapsValue::Bool(v) => write!(f, "(boolean){}", v),
            CapsValue::Str(v) => write!(f, "(string){}", v),
        }
    }
}

/// Negotiated format of a stream: the media type plus its fields.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Caps {
    name: String,
    fields: BTreeMap<String, CapsValue>,
}

impl Caps {
    pub fn new<S: Into<String>>(name: S) -> Caps {
        Caps {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field<S: Into<String>>(mut self, name: S, value: CapsValue) -> Caps {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&CapsValue> {
        self.fields.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.fields.get(name) {
            Some(CapsValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn fraction(&self, name: &str) -> Option<Fraction> {
        match self.fields.get(name) {
            Some(CapsValue::Fraction(v)) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)?;
        for (name, value) in &self.fields {
            write!(f, ", {}={}", name, value)?;
        }
        Ok(())
    }
}
