#[cfg(test)]
pub mod test {
    use crate::codec::DecodeContext;
    use crate::error::{DecodeError, DecodeResult};
    use crate::model::{Declaration, EnumDecl, FloatKind, IntKind, PropertyDecl, PropertyType};
    use crate::naming::NamingPattern;
    use crate::policy::EnumScheme;
    use crate::registry::{CustomDeserializer, DeserializerCandidate};
    use crate::schema::Schema;
    use crate::value::{Record, Value};

    /// A small shop: every primitive kind, an enum with a default, a nested
    /// structure, collections and a source binding.
    pub fn shop_schema() -> Schema {
        Schema::builder()
            .enumeration(EnumDecl::new("Level", ["LOW", "HIGH"]))
            .declare(
                Declaration::new("Server")
                    .property(PropertyDecl::new("host", PropertyType::String))
                    .property(
                        PropertyDecl::new("listenPort", PropertyType::Int(IntKind::U16))
                            .naming(NamingPattern::LowerSnakeCase),
                    ),
            )
            .declare(
                Declaration::new("Item")
                    .generate_to_string()
                    .property(PropertyDecl::new("name", PropertyType::String))
                    .property(PropertyDecl::new("price", PropertyType::Float(FloatKind::F64))),
            )
            .declare(
                Declaration::new("Shop")
                    .source("shop.yml")
                    .property(PropertyDecl::new("name", PropertyType::String).default_value("My Shop"))
                    .property(PropertyDecl::new("motto", PropertyType::String).nullable())
                    .property(
                        PropertyDecl::new("level", PropertyType::enumeration("Level")).default_value("LOW"),
                    )
                    .property(PropertyDecl::new("server", PropertyType::structure("Server")))
                    .property(
                        PropertyDecl::new("items", PropertyType::list(PropertyType::structure("Item")))
                            .nullable(),
                    )
                    .property(
                        PropertyDecl::new(
                            "stock",
                            PropertyType::map(PropertyType::String, PropertyType::Int(IntKind::U32)),
                        )
                        .nullable(),
                    ),
            )
            .build()
            .unwrap()
    }

    /// The same enum property matched exactly and case-insensitively.
    pub fn enum_schema() -> Schema {
        Schema::builder()
            .enumeration(EnumDecl::new("Greeting", ["HELLO", "GOODBYE"]))
            .declare(
                Declaration::new("Exact")
                    .property(PropertyDecl::new("greeting", PropertyType::enumeration("Greeting"))),
            )
            .declare(
                Declaration::new("Relaxed")
                    .enum_scheme(EnumScheme::CaseInsensitive)
                    .property(PropertyDecl::new("greeting", PropertyType::enumeration("Greeting"))),
            )
            .build()
            .unwrap()
    }

    /// `Parent` is a union of an empty `Child1` and `Child2(value)`; `Required`
    /// has one required property.
    pub fn union_schema() -> Schema {
        Schema::builder()
            .declare(Declaration::union("Parent"))
            .declare(Declaration::new("Child1").enclosed_in("Parent"))
            .declare(
                Declaration::new("Child2")
                    .enclosed_in("Parent")
                    .property(PropertyDecl::new("value", PropertyType::int())),
            )
            .declare(Declaration::new("Required").property(PropertyDecl::new("x", PropertyType::int())))
            .build()
            .unwrap()
    }

    /// A union whose alternatives share a base property.
    pub fn shapes_schema() -> Schema {
        Schema::builder()
            .declare(Declaration::union("Shape").property(PropertyDecl::new("colour", PropertyType::String)))
            .declare(
                Declaration::new("Circle")
                    .extends("Shape")
                    .property(PropertyDecl::new("radius", PropertyType::Float(FloatKind::F64))),
            )
            .declare(
                Declaration::new("Square")
                    .extends("Shape")
                    .property(PropertyDecl::new("side", PropertyType::Float(FloatKind::F64))),
            )
            .build()
            .unwrap()
    }

    fn always_hello(_: &DecodeContext<'_>) -> DecodeResult<Value> {
        Ok(Value::opaque("CustomType", "hello"))
    }

    fn describe_site(ctx: &DecodeContext<'_>) -> DecodeResult<Value> {
        let text = ctx.data().as_str().unwrap_or_default();
        Ok(Value::opaque(
            "Colour",
            format!("{}.{}={text}", ctx.structure(), ctx.property()),
        ))
    }

    /// Reads `FallbackType` from a bare string.
    pub struct Shorthand;

    impl CustomDeserializer for Shorthand {
        fn decode(&self, ctx: &DecodeContext<'_>) -> DecodeResult<Value> {
            match ctx.data().as_str() {
                Some(text) => Ok(Value::Record(Record::new("FallbackType").with("test", text))),
                None => Err(DecodeError::custom("shorthand must be a string")),
            }
        }
    }

    /// A global regular deserializer, a global fallback and an opt-in one.
    pub fn custom_schema() -> Schema {
        Schema::builder()
            .deserializer(
                DeserializerCandidate::new("always-hello")
                    .target("CustomType")
                    .produces("CustomType")
                    .function(always_hello)
                    .global(),
            )
            .deserializer(
                DeserializerCandidate::new("shorthand")
                    .target("FallbackType")
                    .capability(Shorthand)
                    .fallback()
                    .global(),
            )
            .deserializer(
                DeserializerCandidate::new("colour")
                    .target("Colour")
                    .function(describe_site),
            )
            .declare(
                Declaration::new("FallbackType").property(PropertyDecl::new("test", PropertyType::String)),
            )
            .declare(
                Declaration::new("CustomConfig")
                    .property(PropertyDecl::new("customType", PropertyType::custom("CustomType")))
                    .property(PropertyDecl::new("fallbackType", PropertyType::structure("FallbackType")))
                    .property(
                        PropertyDecl::new("many", PropertyType::list(PropertyType::custom("CustomType")))
                            .nullable(),
                    )
                    .property(
                        PropertyDecl::new("colour", PropertyType::custom("Colour"))
                            .use_custom_deserializer()
                            .nullable(),
                    ),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn fixtures_build() {
        shop_schema();
        enum_schema();
        union_schema();
        shapes_schema();
        custom_schema();
    }
}
