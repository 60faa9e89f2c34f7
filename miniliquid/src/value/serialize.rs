use std::sync::Arc;

use serde::{ser, Serialize, Serializer};

use crate::error::Error;
use crate::value::{Value, ValueMap, ValueRepr};

// Values passed through `from_serialize` (objects included) must come out
// unchanged.  While a conversion runs, `Value::serialize` parks the value in
// a thread local stash and emits a marker unit variant carrying the handle.
const HANDLE_MARKER: &str = "\x01__miniliquid_value_handle";

mod stash {
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    use crate::utils::OnDrop;
    use crate::value::Value;

    thread_local! {
        static ACTIVE: Cell<bool> = const { Cell::new(false) };
        static NEXT_HANDLE: Cell<u32> = const { Cell::new(0) };
        static VALUES: RefCell<BTreeMap<u32, Value>> = const { RefCell::new(BTreeMap::new()) };
    }

    /// Marks the current thread as converting into values until the guard drops.
    pub fn activate() -> impl Drop {
        let was_active = ACTIVE.with(|flag| flag.replace(true));
        OnDrop::new(move || {
            if !was_active {
                ACTIVE.with(|flag| flag.set(false));
            }
        })
    }

    pub fn is_active() -> bool {
        ACTIVE.with(|flag| flag.get())
    }

    pub fn put(value: Value) -> u32 {
        let handle = NEXT_HANDLE.with(|next| {
            let handle = next.get().wrapping_add(1);
            next.set(handle);
            handle
        });
        VALUES.with(|values| values.borrow_mut().insert(handle, value));
        handle
    }

    pub fn take(handle: u32) -> Option<Value> {
        VALUES.with(|values| values.borrow_mut().remove(&handle))
    }
}

/// Converts a serializable value into a [`Value`].
///
/// Anything that fails to serialize becomes nil.
pub fn transform<T: Serialize + ?Sized>(value: &T) -> Value {
    let _guard = stash::activate();
    value.serialize(ValueSerializer).unwrap_or(Value::NIL)
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if stash::is_active() {
            let handle = stash::put(self.clone());
            return serializer.serialize_unit_variant(HANDLE_MARKER, handle, HANDLE_MARKER);
        }

        match self.0 {
            ValueRepr::Nil => serializer.serialize_unit(),
            ValueRepr::Bool(b) => serializer.serialize_bool(b),
            ValueRepr::I64(i) => serializer.serialize_i64(i),
            ValueRepr::F64(f) => serializer.serialize_f64(f),
            ValueRepr::String(ref s) => serializer.serialize_str(s),
            ValueRepr::Array(ref items) => items.serialize(serializer),
            ValueRepr::Range(start, end) => serializer.collect_seq(start..=end),
            ValueRepr::Hash(ref entries, _) => {
                serializer.collect_map(entries.iter().map(|(k, v)| (&**k, v)))
            }
            // drops serialize as their items, or as their rendered form
            ValueRepr::Object(ref obj) => match obj.enumerate() {
                Some(items) => items.serialize(serializer),
                None => serializer.serialize_str(&self.to_string()),
            },
        }
    }
}

fn into_key(value: Value) -> Arc<str> {
    match value.0 {
        ValueRepr::String(s) => s,
        _ => Arc::from(value.to_string()),
    }
}

// enum variants with data become a single entry hash `{variant: data}`
fn wrap_variant(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(variant) => {
            let mut map = ValueMap::default();
            map.insert(Arc::from(variant), value);
            Value::from_map(map)
        }
        None => value,
    }
}

fn integer<I: Into<i128>>(v: I) -> Value {
    let v: i128 = v.into();
    match i64::try_from(v) {
        Ok(v) => Value::from(v),
        Err(_) => Value::from(v as f64),
    }
}

/// The serde serializer that produces [`Value`]s.
pub struct ValueSerializer;

macro_rules! serialize_integers {
    ($($method:ident: $ty:ty),* $(,)?) => {
        $(
            fn $method(self, v: $ty) -> Result<Value, Error> {
                Ok(integer(v))
            }
        )*
    };
}

impl Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = ArrayBuilder;
    type SerializeTuple = ArrayBuilder;
    type SerializeTupleStruct = ArrayBuilder;
    type SerializeTupleVariant = ArrayBuilder;
    type SerializeMap = HashBuilder;
    type SerializeStruct = HashBuilder;
    type SerializeStructVariant = HashBuilder;

    serialize_integers! {
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
    }

    fn serialize_u128(self, v: u128) -> Result<Value, Error> {
        Ok(match i64::try_from(v) {
            Ok(v) => Value::from(v),
            Err(_) => Value::from(v as f64),
        })
    }

    fn serialize_bool(self, v: bool) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, Error> {
        Ok(Value::from(v as f64))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_str(self, v: &str) -> Result<Value, Error> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, Error> {
        Ok(Value::from(String::from_utf8_lossy(v)))
    }

    fn serialize_none(self) -> Result<Value, Error> {
        Ok(Value::NIL)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, Error> {
        Ok(Value::NIL)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, Error> {
        Ok(Value::NIL)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        index: u32,
        variant: &'static str,
    ) -> Result<Value, Error> {
        if name == HANDLE_MARKER && variant == HANDLE_MARKER {
            stash::take(index).ok_or_else(|| ser::Error::custom("unknown value handle"))
        } else {
            Ok(Value::from(variant))
        }
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, Error> {
        Ok(wrap_variant(Some(variant), ok!(value.serialize(self))))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ArrayBuilder, Error> {
        Ok(ArrayBuilder::new(len.unwrap_or(0), None))
    }

    fn serialize_tuple(self, len: usize) -> Result<ArrayBuilder, Error> {
        Ok(ArrayBuilder::new(len, None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<ArrayBuilder, Error> {
        Ok(ArrayBuilder::new(len, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ArrayBuilder, Error> {
        Ok(ArrayBuilder::new(len, Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<HashBuilder, Error> {
        Ok(HashBuilder::new(None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<HashBuilder, Error> {
        Ok(HashBuilder::new(None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<HashBuilder, Error> {
        Ok(HashBuilder::new(Some(variant)))
    }
}

/// Collects sequences, tuples and tuple variants into an array.
pub struct ArrayBuilder {
    items: Vec<Value>,
    variant: Option<&'static str>,
}

impl ArrayBuilder {
    fn new(len: usize, variant: Option<&'static str>) -> ArrayBuilder {
        ArrayBuilder {
            items: Vec::with_capacity(len.min(1024)),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.items.push(ok!(value.serialize(ValueSerializer)));
        Ok(())
    }

    fn finish(self) -> Result<Value, Error> {
        Ok(wrap_variant(self.variant, Value::from(self.items)))
    }
}

impl ser::SerializeSeq for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

impl ser::SerializeTuple for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for ArrayBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.push(value)
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

/// Collects maps, structs and struct variants into a hash.
pub struct HashBuilder {
    entries: ValueMap,
    pending_key: Option<Arc<str>>,
    variant: Option<&'static str>,
}

impl HashBuilder {
    fn new(variant: Option<&'static str>) -> HashBuilder {
        HashBuilder {
            entries: ValueMap::default(),
            pending_key: None,
            variant,
        }
    }

    fn insert<T: Serialize + ?Sized>(&mut self, key: Arc<str>, value: &T) -> Result<(), Error> {
        let value = ok!(value.serialize(ValueSerializer));
        self.entries.insert(key, value);
        Ok(())
    }

    fn finish(self) -> Result<Value, Error> {
        Ok(wrap_variant(self.variant, Value::from_map(self.entries)))
    }
}

impl ser::SerializeMap for HashBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Error> {
        self.pending_key = Some(into_key(ok!(key.serialize(ValueSerializer))));
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        match self.pending_key.take() {
            Some(key) => self.insert(key, value),
            None => Err(ser::Error::custom("map value without a key")),
        }
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

impl ser::SerializeStruct for HashBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.insert(Arc::from(key), value)
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for HashBuilder {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.insert(Arc::from(key), value)
    }

    fn end(self) -> Result<Value, Error> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::value::Object;

    #[derive(Debug)]
    struct Opaque;

    impl Object for Opaque {
        fn get_value(&self, _key: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn test_objects_survive_conversion() {
        let obj = Value::from_object(Opaque);
        let mut map = BTreeMap::new();
        map.insert("obj", obj.clone());
        let rv = Value::from_serialize(&map);
        assert_eq!(rv.get_key("obj"), Some(obj));
    }

    #[test]
    fn test_non_string_keys() {
        let mut map = BTreeMap::new();
        map.insert(1, "one");
        let rv = Value::from_serialize(&map);
        assert_eq!(rv.get_key("1"), Some(Value::from("one")));
    }

    #[test]
    fn test_large_integers() {
        assert_eq!(Value::from_serialize(&42u8), Value::from(42));
        assert_eq!(Value::from_serialize(&u64::MAX), Value::from(u64::MAX as f64));
    }

    #[test]
    fn test_enum_variants() {
        #[derive(serde::Serialize)]
        enum Shape {
            Dot,
            Square(i32),
            Rect { w: i32 },
        }

        assert_eq!(Value::from_serialize(&Shape::Dot), Value::from("Dot"));
        let square = Value::from_serialize(&Shape::Square(2));
        assert_eq!(square.get_key("Square"), Some(Value::from(2)));
        let rect = Value::from_serialize(&Shape::Rect { w: 3 });
        assert_eq!(
            rect.get_key("Rect").and_then(|x| x.get_key("w")),
            Some(Value::from(3))
        );
    }
}
