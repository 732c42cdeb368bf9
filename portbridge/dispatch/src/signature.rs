//! Canonical method signature keys.
//!
//! Grammar: `name(<param>*)<ret>` where each type is one of
//! `V Z B C S I J F D`, `[<type>` for arrays, `L<qualified/name>;` for
//! reference types, or `?` for anything that cannot be described.
//!
//! Inside a reference name `.` becomes `/`, and `;`, `/` and `%` are written
//! as `%XX` hex escapes, so distinct names always give distinct keys.

use api::{MethodDesc, TypeDesc};

pub const EQUALS: &str = "equals(Ljava/lang/Object;)Z";
pub const HASH_CODE: &str = "hashCode()I";
pub const TO_STRING: &str = "toString()Ljava/lang/String;";

const UNSUPPORTED: char = '?';
const ESCAPE: char = '%';

pub fn encode(name: &str, params: &[TypeDesc], ret: &TypeDesc) -> String {
    let mut key = String::with_capacity(name.len() + 2 + params.len() * 2);
    key.push_str(name);
    key.push('(');
    for param in params {
        encode_type(&mut key, param);
    }
    key.push(')');
    encode_type(&mut key, ret);
    key
}

pub fn encode_method(method: &MethodDesc) -> String {
    encode(&method.name, &method.params, &method.ret)
}

pub fn encode_type(out: &mut String, ty: &TypeDesc) {
    match ty {
        TypeDesc::Void => out.push('V'),
        TypeDesc::Boolean => out.push('Z'),
        TypeDesc::Byte => out.push('B'),
        TypeDesc::Char => out.push('C'),
        TypeDesc::Short => out.push('S'),
        TypeDesc::Int => out.push('I'),
        TypeDesc::Long => out.push('J'),
        TypeDesc::Float => out.push('F'),
        TypeDesc::Double => out.push('D'),
        TypeDesc::Array(element) => {
            out.push('[');
            encode_type(out, element);
        }
        TypeDesc::Reference(name) => {
            out.push('L');
            for c in name.chars() {
                match c {
                    '.' => out.push('/'),
                    ';' | '/' | ESCAPE => {
                        out.push(ESCAPE);
                        out.push_str(&format!("{:02X}", c as u32));
                    }
                    c => out.push(c),
                }
            }
            out.push(';');
        }
        TypeDesc::Unsupported => out.push(UNSUPPORTED),
    }
}
