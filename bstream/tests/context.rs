#[macro_use]
extern crate hamcrest;

use bstream::{
    default_context, ByteOrder, ContextOptions, Deserialize, ErrorCategory, ErrorCode, IBStream,
    OBStream, OpenMode, Polymorphic, Serialize, StreamContext, StreamErrc, StreamError, INVALID_TAG,
};
use bytes::Bytes;
use hamcrest::prelude::*;
use std::any::TypeId;
use std::sync::Arc;

trait Drawable: Polymorphic {
    fn describe(&self) -> String;
}

trait Shape: Drawable + std::fmt::Debug {
    fn area(&self) -> f64;
}

#[derive(Debug, PartialEq)]
struct Circle {
    radius: f64,
}

#[derive(Debug, PartialEq)]
struct Rect {
    width: f64,
    height: f64,
}

#[derive(Debug, PartialEq)]
struct Label {
    text: String,
}

/// Polymorphic but never registered.
#[derive(Debug)]
struct Triangle;

impl Serialize for Circle {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_f64(self.radius)
    }
}

impl Deserialize for Circle {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        Ok(Self {
            radius: is.read_f64()?,
        })
    }
}

impl Polymorphic for Circle {}

impl Drawable for Circle {
    fn describe(&self) -> String {
        format!("circle r={}", self.radius)
    }
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        3.0 * self.radius * self.radius
    }
}

impl Serialize for Rect {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write(&self.width)?.write(&self.height)?;
        Ok(())
    }
}

impl Deserialize for Rect {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        Ok(Self {
            width: is.read()?,
            height: is.read()?,
        })
    }
}

impl Polymorphic for Rect {}

impl Drawable for Rect {
    fn describe(&self) -> String {
        format!("rect {}x{}", self.width, self.height)
    }
}

impl Shape for Rect {
    fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl Serialize for Label {
    fn serialize(&self, os: &mut OBStream<'_>) -> Result<(), StreamError> {
        os.write_str(&self.text)
    }
}

impl Deserialize for Label {
    fn deserialize(is: &mut IBStream<'_>) -> Result<Self, StreamError> {
        Ok(Self {
            text: is.read_string()?,
        })
    }
}

impl Polymorphic for Label {}

impl Drawable for Label {
    fn describe(&self) -> String {
        format!("label {}", self.text)
    }
}

impl Serialize for Triangle {
    fn serialize(&self, _os: &mut OBStream<'_>) -> Result<(), StreamError> {
        Ok(())
    }
}

impl Polymorphic for Triangle {}

impl Drawable for Triangle {
    fn describe(&self) -> String {
        "triangle".to_string()
    }
}

const DRAWABLE: i32 = 0;
const SHAPE: i32 = 1;
const CIRCLE: i32 = 2;
const RECT: i32 = 3;
const LABEL: i32 = 4;

fn shapes_context(options: ContextOptions) -> StreamContext {
    StreamContext::builder()
        .options(options)
        .abstract_type::<dyn Drawable>()
        .abstract_type::<dyn Shape>()
        .concrete::<Circle>()
        .concrete::<Rect>()
        .concrete::<Label>()
        .base::<dyn Shape, dyn Drawable>(|b| b, |a| a)
        .base::<Circle, dyn Shape>(|b| b, |a| a)
        .base::<Rect, dyn Shape>(|b| b, |a| a)
        .base::<Label, dyn Drawable>(|b| b, |a| a)
        .build()
        .expect("Should build context")
}

fn write_with(
    context: &StreamContext,
    f: impl FnOnce(&mut OBStream<'_>) -> Result<(), StreamError>,
) -> Bytes {
    let mut sink = context.memory_sink();
    {
        let mut os = OBStream::new(&mut sink, context);
        f(&mut os).expect("Should write");
    }
    sink.release_bytes()
}

#[test]
fn tags_follow_registration_order() {
    let context = shapes_context(ContextOptions::default());
    assert_eq!(context.type_count(), 5);
    assert_eq!(context.type_tag::<dyn Drawable>(), DRAWABLE);
    assert_eq!(context.type_tag::<dyn Shape>(), SHAPE);
    assert_eq!(context.type_tag::<Circle>(), CIRCLE);
    assert_eq!(context.get_type_tag(TypeId::of::<Rect>()), RECT);
    assert_eq!(context.type_tag::<Label>(), LABEL);
    assert_eq!(context.type_tag::<Triangle>(), INVALID_TAG);
}

#[test]
fn downcast_matrix_is_reflexive_and_transitive() {
    let context = shapes_context(ContextOptions::default());
    for tag in 0..5 {
        assert!(context.can_downcast(tag, tag));
    }
    assert!(context.can_downcast(CIRCLE, SHAPE));
    assert!(context.can_downcast(CIRCLE, DRAWABLE));
    assert!(context.can_downcast(RECT, DRAWABLE));
    assert!(context.can_downcast(LABEL, DRAWABLE));
    assert!(context.can_downcast(SHAPE, DRAWABLE));

    assert!(!context.can_downcast(SHAPE, CIRCLE));
    assert!(!context.can_downcast(LABEL, SHAPE));
    assert!(!context.can_downcast(CIRCLE, RECT));
    assert!(!context.can_downcast(CIRCLE, INVALID_TAG));
    assert!(!context.can_downcast(99, DRAWABLE));
}

#[test]
fn poly_objects_round_trip_through_base() {
    let context = shapes_context(ContextOptions::default());
    let shapes: Vec<Box<dyn Shape>> = vec![
        Box::new(Circle { radius: 2.0 }),
        Box::new(Rect {
            width: 3.0,
            height: 4.0,
        }),
    ];
    let bytes = write_with(&context, |os| {
        for shape in &shapes {
            os.write_poly(Some(&**shape))?;
        }
        os.write_poly::<dyn Shape>(None)
    });

    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let first = is.read_poly::<dyn Shape>().unwrap().expect("Should read circle");
    assert_eq!(first.area(), 12.0);
    assert_eq!(first.describe(), "circle r=2");
    let second = is.read_poly::<dyn Drawable>().unwrap().expect("Should read rect");
    assert_eq!(second.describe(), "rect 3x4");
    assert!(is.read_poly::<dyn Shape>().unwrap().is_none());
    assert_eq!(is.remaining(), 0);
}

#[test]
fn poly_object_read_as_concrete_type() {
    let context = shapes_context(ContextOptions::default());
    let bytes = write_with(&context, |os| {
        os.write_poly::<dyn Drawable>(Some(&Label {
            text: "hi".to_string(),
        }))
    });
    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let label = is.read_poly::<Label>().unwrap().unwrap();
    assert_eq!(
        *label,
        Label {
            text: "hi".to_string()
        }
    );
}

#[test]
fn wrong_base_is_rejected_before_reading() {
    let context = shapes_context(ContextOptions::default());
    let bytes = write_with(&context, |os| {
        os.write_poly::<dyn Drawable>(Some(&Label {
            text: "not a shape".to_string(),
        }))
    });
    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let err = is.read_poly::<dyn Shape>().unwrap_err();
    assert!(matches!(
        err,
        StreamError::InvalidPtrDowncast {
            from: LABEL,
            to: SHAPE
        }
    ));
    assert_eq!(is.position(), 4);
}

#[test]
fn shared_object_of_wrong_base_is_rejected() {
    let context = shapes_context(ContextOptions::default());
    let label: Arc<dyn Drawable> = Arc::new(Label {
        text: "not a shape".to_string(),
    });
    let bytes = write_with(&context, |os| os.write_shared(Some(&label)));

    let mut source = context.buffer_source(bytes.clone());
    let mut is = IBStream::new(&mut source, &context);
    let err = is.read_shared::<dyn Shape>().unwrap_err();
    assert!(matches!(
        err,
        StreamError::InvalidPtrDowncast {
            from: LABEL,
            to: SHAPE
        }
    ));
    assert_eq!(is.position(), 4);
    assert!(is.shared_objects().is_empty());

    let mut source = context.buffer_source(bytes.slice(8..));
    let mut is = IBStream::new(&mut source, &context);
    assert!(matches!(
        context.create_shared::<dyn Shape>(LABEL, &mut is),
        Err(StreamError::InvalidPtrDowncast {
            from: LABEL,
            to: SHAPE
        })
    ));
    let label = context
        .create_shared::<dyn Drawable>(LABEL, &mut is)
        .expect("Should read the label as a drawable");
    assert_eq!(label.describe(), "label not a shape");
}

#[test]
fn unregistered_type_cannot_be_written() {
    let context = shapes_context(ContextOptions::default());
    let mut sink = context.memory_sink();
    let mut os = OBStream::new(&mut sink, &context);
    let err = os.write_poly::<dyn Drawable>(Some(&Triangle)).unwrap_err();
    assert!(matches!(err, StreamError::UnregisteredType(_)));
}

#[test]
fn unregistered_target_type() {
    let context = shapes_context(ContextOptions::default());
    let bytes = write_with(&context, |os| os.write_poly::<dyn Shape>(Some(&Circle { radius: 1.0 })));
    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let err = is.read_poly::<Triangle>().unwrap_err();
    assert!(matches!(err, StreamError::UnregisteredType(_)));
}

#[test]
fn abstract_and_unknown_tags() {
    let context = shapes_context(ContextOptions::default());
    let bytes = write_with(&context, |os| {
        os.write_i32(SHAPE)?;
        os.write_i32(42)
    });
    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    assert!(matches!(
        is.read_poly::<dyn Shape>(),
        Err(StreamError::AbstractNonPolyClass(SHAPE))
    ));
    assert!(matches!(
        is.read_poly::<dyn Shape>(),
        Err(StreamError::InvalidTag(42))
    ));
}

#[test]
fn abstract_factory_is_null() {
    let context = shapes_context(ContextOptions::default());
    let mut source = context.buffer_source(Bytes::new());
    let mut is = IBStream::new(&mut source, &context);
    assert!(context.create_raw_from_tag(DRAWABLE, &mut is).unwrap().is_none());
    assert!(context.create_shared_from_tag(SHAPE, &mut is).unwrap().is_none());
    assert!(matches!(
        context.create_raw_from_tag(7, &mut is),
        Err(StreamError::InvalidTag(7))
    ));
}

#[test]
fn shared_objects_are_deduplicated() {
    let context = shapes_context(ContextOptions::default());
    let circle: Arc<dyn Shape> = Arc::new(Circle { radius: 1.0 });
    let rect: Arc<dyn Shape> = Arc::new(Rect {
        width: 1.0,
        height: 2.0,
    });
    let bytes = write_with(&context, |os| {
        os.write_shared(Some(&circle))?;
        os.write_shared(Some(&rect))?;
        os.write_shared(Some(&circle))?;
        os.write_shared::<dyn Shape>(None)
    });
    // circle: tag, ref 0, radius; rect: tag, ref 0, two f64; circle again: tag, ref 1; null tag
    assert_that!(bytes.len(), is(equal_to(16 + 24 + 8 + 4)));
    assert_eq!(&bytes[40..48], &[0, 0, 0, 2, 0, 0, 0, 1]);

    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let first = is.read_shared::<dyn Shape>().unwrap().unwrap();
    let second = is.read_shared::<dyn Shape>().unwrap().unwrap();
    let third = is.read_shared::<dyn Drawable>().unwrap().unwrap();
    assert!(is.read_shared::<dyn Shape>().unwrap().is_none());
    assert_eq!(first.area(), 3.0);
    assert_eq!(second.area(), 2.0);
    assert_eq!(third.describe(), "circle r=1");
    assert!(std::ptr::addr_eq(Arc::as_ptr(&first), Arc::as_ptr(&third)));
    assert!(!std::ptr::addr_eq(Arc::as_ptr(&first), Arc::as_ptr(&second)));
    assert_eq!(is.shared_objects().len(), 2);
}

#[test]
fn shared_objects_without_dedup() {
    let context = shapes_context(ContextOptions::default().with_dedup_shared_ptrs(false));
    let circle: Arc<dyn Shape> = Arc::new(Circle { radius: 1.0 });
    let bytes = write_with(&context, |os| {
        os.write_shared(Some(&circle))?;
        os.write_shared(Some(&circle))
    });
    assert_eq!(bytes.len(), 32);

    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let first = is.read_shared::<Circle>().unwrap().unwrap();
    let second = is.read_shared::<Circle>().unwrap().unwrap();
    assert_eq!(first, second);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn dangling_shared_reference() {
    let context = shapes_context(ContextOptions::default());
    let bytes = write_with(&context, |os| {
        os.write_i32(CIRCLE)?;
        os.write_u32(3)
    });
    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    assert!(matches!(
        is.read_shared::<dyn Shape>(),
        Err(StreamError::InvalidState(_))
    ));
}

#[derive(Debug)]
struct AppCategory;

impl ErrorCategory for AppCategory {
    fn name(&self) -> &'static str {
        "app"
    }

    fn message(&self, value: i32) -> String {
        format!("app error {value}")
    }
}

static APP_CATEGORY: AppCategory = AppCategory;

#[test]
fn error_codes_cross_the_stream() {
    let context = StreamContext::new(ContextOptions::default().with_error_categories(&[&APP_CATEGORY]));
    let codes = vec![
        ErrorCode::from(StreamErrc::NotOpen),
        ErrorCode::system(2),
        ErrorCode::new(7, &APP_CATEGORY),
    ];
    let bytes = write_with(&context, |os| {
        os.write(&codes)?;
        Ok(())
    });
    assert_eq!(&bytes[8..16], &[0, 0, 0, 2, 0, 0, 0, 13]);

    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, &context);
    let decoded: Vec<ErrorCode> = is.read().unwrap();
    assert_eq!(decoded, codes);
    assert!(decoded[0].is(StreamErrc::NotOpen));
    assert_eq!(decoded[2].message(), "app error 7");
}

#[test]
fn unknown_error_category_is_rejected() {
    let context = default_context();
    let mut sink = context.memory_sink();
    let mut os = OBStream::new(&mut sink, context);
    let err = os.write_error_code(&ErrorCode::new(1, &APP_CATEGORY)).unwrap_err();
    assert!(matches!(err, StreamError::InvalidErrCategory(_)));

    let bytes = write_with(context, |os| {
        os.write_i32(9)?;
        os.write_i32(1)
    });
    let mut source = context.buffer_source(bytes);
    let mut is = IBStream::new(&mut source, context);
    assert!(matches!(
        is.read_error_code(),
        Err(StreamError::InvalidErrCategory(_))
    ));
}

#[test]
fn builder_rejects_bad_registrations() {
    let err = StreamContext::builder()
        .concrete::<Circle>()
        .concrete::<Circle>()
        .build()
        .unwrap_err();
    assert!(matches!(err, StreamError::InvalidOperation(_)));

    let err = StreamContext::builder()
        .concrete::<Circle>()
        .base::<Circle, dyn Shape>(|b| b, |a| a)
        .build()
        .unwrap_err();
    assert!(matches!(err, StreamError::UnregisteredType(_)));
}

#[test]
fn edges_may_precede_types() {
    let context = StreamContext::builder()
        .base::<Circle, dyn Shape>(|b| b, |a| a)
        .concrete::<Circle>()
        .abstract_type::<dyn Shape>()
        .build()
        .unwrap();
    assert!(context.can_downcast(0, 1));
}

#[test]
fn default_context_is_shared() {
    let a = default_context();
    let b = default_context();
    assert!(std::ptr::eq(a, b));
    assert_eq!(a.type_count(), 0);
    assert_eq!(a.byte_order(), ByteOrder::BigEndian);
    assert_eq!(a.buffer_size(), 65536);
    assert!(a.dedup_shared_ptrs());
}

#[test]
fn context_builds_streams_in_its_byte_order() {
    let context = StreamContext::new(
        ContextOptions::default()
            .with_byte_order(ByteOrder::LittleEndian)
            .with_buffer_size(8),
    );
    let mut sink = context.memory_sink();
    sink.put_num(1u16).unwrap();
    assert_eq!(sink.get_buffer(), &[1, 0]);

    let mut segments = context.bufseq_sink();
    assert_eq!(segments.segment_capacity(), 8);
    segments.putn(&[0; 9]).unwrap();
    assert_eq!(segments.segment_count(), 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctx.bin");
    let mut file = context.file_sink(&path, OpenMode::Truncate).unwrap();
    assert_eq!(file.buffer_size(), 8);
    file.put_num(0x0102_0304u32).unwrap();
    file.close().unwrap();

    let mut source = context.file_source(&path).unwrap();
    assert_eq!(source.get_num::<u32>().unwrap(), 0x0102_0304);
    assert_eq!(source.byte_order(), ByteOrder::LittleEndian);
}
