//! Walks a `Ref`'s parts through a [`TypeTree`], checking each index
//! operand against the type known so far (§4.2 "Reference checking").

use crate::error::{CompileError, TypeErrorDetail};
use crate::types::tree::TypeTree;
use crate::types::Type;
use crate::value::{Term, Value};

fn key_type_of(term: &Term) -> Type {
    match &term.value {
        Value::String(_) => Type::String,
        Value::Number(_) => Type::Number,
        Value::Boolean(_) => Type::Boolean,
        Value::Null => Type::Null,
        _ => Type::any_top(),
    }
}

/// `true` for the scalar operand kinds legal as an object key. Composite
/// operands (array/object/set literals) are only legal over sets (§4.2
/// "Reference checking").
fn is_scalar_key(term: &Term) -> bool {
    matches!(
        term.value,
        Value::String(_) | Value::Number(_) | Value::Boolean(_) | Value::Null
    )
}

/// Returns the type of the value reached by walking `parts` (head included)
/// through `tree`, or a `TypeErr` if an operand isn't legal at its position.
pub fn ref_check(parts: &[Term], tree: &TypeTree) -> Result<Type, CompileError> {
    let head = &parts[0];
    let mut current = tree.get(std::slice::from_ref(head)).unwrap_or_else(Type::any_top);

    for (i, part) in parts.iter().enumerate().skip(1) {
        if !part.value.is_ground() {
            // A var/ref index can't be statically resolved to one key; the
            // result is whatever the node's shape allows in general.
            current = match &current {
                Type::Object(obj) => obj
                    .dynamic
                    .as_ref()
                    .map(|(_, v)| (**v).clone())
                    .unwrap_or_else(Type::any_top),
                Type::Set(elem) => (**elem).clone(),
                Type::Array(arr) => arr.dynamic.as_deref().cloned().unwrap_or_else(Type::any_top),
                _ => Type::any_top(),
            };
            continue;
        }

        current = match &current {
            Type::Object(obj) => {
                if !is_scalar_key(part) {
                    return Err(CompileError::type_err(
                        part.location.clone(),
                        TypeErrorDetail::RefErrUnsupported {
                            pos: i,
                            have: key_type_of(part).to_string(),
                        },
                    ));
                }
                if let Some(t) = obj.statics.get(part) {
                    t.clone()
                } else if let Some((key_ty, val_ty)) = &obj.dynamic {
                    let actual = key_type_of(part);
                    if crate::types::unifies(&actual, key_ty) {
                        (**val_ty).clone()
                    } else {
                        return Err(invalid(i, part, &actual, key_ty, &obj.statics));
                    }
                } else if obj.statics.is_empty() {
                    // Nothing recorded about this path yet; permissive.
                    Type::any_top()
                } else {
                    let actual = key_type_of(part);
                    return Err(invalid(i, part, &actual, &Type::any_top(), &obj.statics));
                }
            }
            Type::Array(arr) => match &part.value {
                Value::Number(n) => {
                    if let Some(idx) = n.to_i64().filter(|v| *v >= 0) {
                        if let Some(t) = arr.statics.get(idx as usize) {
                            t.clone()
                        } else if let Some(d) = &arr.dynamic {
                            (**d).clone()
                        } else {
                            return Err(CompileError::type_err(
                                part.location.clone(),
                                TypeErrorDetail::RefErrMissing,
                            ));
                        }
                    } else {
                        return Err(CompileError::type_err(
                            part.location.clone(),
                            TypeErrorDetail::RefErrUnsupported {
                                pos: i,
                                have: part.value.to_string(),
                            },
                        ));
                    }
                }
                _ => {
                    return Err(CompileError::type_err(
                        part.location.clone(),
                        TypeErrorDetail::RefErrUnsupported {
                            pos: i,
                            have: key_type_of(part).to_string(),
                        },
                    ))
                }
            },
            Type::Set(elem) => (**elem).clone(),
            Type::Any(variants) if variants.is_empty() => Type::any_top(),
            Type::Null | Type::Boolean | Type::Number | Type::String | Type::Function(_) => {
                return Err(CompileError::type_err(
                    part.location.clone(),
                    TypeErrorDetail::RefErrUnsupported {
                        pos: i,
                        have: current.to_string(),
                    },
                ));
            }
            _ => Type::any_top(),
        };
    }
    Ok(current)
}

fn invalid(
    pos: usize,
    part: &Term,
    have: &Type,
    want: &Type,
    statics: &std::collections::BTreeMap<Term, Type>,
) -> CompileError {
    let one_of = statics.keys().map(|k| k.to_string()).collect();
    CompileError::type_err(
        part.location.clone(),
        TypeErrorDetail::RefErrInvalid {
            pos,
            have: have.to_string(),
            want: want.to_string(),
            one_of,
        },
    )
}
