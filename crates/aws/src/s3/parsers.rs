//! S3 response parsers

use nb_core::{Attributes, FieldType, RawResponse, Result, Value};

use crate::xml::{Element, Shape, with_lists};

fn is_list(name: &str) -> bool {
    name == "Buckets"
}

fn type_of(name: &str) -> Option<FieldType> {
    match name {
        "MaxKeys" | "Size" => Some(FieldType::Integer),
        "IsTruncated" => Some(FieldType::Boolean),
        "CreationDate" | "LastModified" => Some(FieldType::Timestamp),
        _ => None,
    }
}

pub static S3: Shape = Shape {
    is_list,
    repeated: &["Contents", "CommonPrefixes"],
    type_of,
};

fn document(raw: &RawResponse) -> Result<Element> {
    Element::parse(&raw.body_text())
}

/// `ListAllMyBucketsResult`: `Owner` and `Buckets`
pub fn get_service(raw: &RawResponse) -> Result<Attributes> {
    let root = document(raw)?;
    Ok(with_lists(S3.attributes(&root), &["Buckets"]))
}

/// `ListBucketResult`: listing envelope plus `Contents` and `CommonPrefixes`
pub fn get_bucket(raw: &RawResponse) -> Result<Attributes> {
    let root = document(raw)?;
    Ok(with_lists(
        S3.attributes(&root),
        &["Contents", "CommonPrefixes"],
    ))
}

/// The root element's text; empty for the classic US region
pub fn get_bucket_location(raw: &RawResponse) -> Result<Attributes> {
    let root = document(raw)?;
    Ok(Attributes::new().with("LocationConstraint", root.text))
}

pub fn get_request_payment(raw: &RawResponse) -> Result<Attributes> {
    let root = document(raw)?;
    Ok(S3.attributes(&root))
}

pub fn put_object(raw: &RawResponse) -> Result<Attributes> {
    Ok(Attributes::new().with("ETag", raw.header("etag").unwrap_or_default()))
}

/// Object metadata from `HEAD`/`GET` response headers
pub fn object_metadata(raw: &RawResponse) -> Result<Attributes> {
    let mut attrs = Attributes::new();
    if let Some(etag) = raw.header("etag") {
        attrs.insert("ETag", etag);
    }
    if let Some(length) = raw.header("content-length") {
        attrs.insert("Size", Value::from(length).coerce(FieldType::Integer));
    }
    if let Some(content_type) = raw.header("content-type") {
        attrs.insert("ContentType", content_type);
    }
    if let Some(modified) = raw.header("last-modified") {
        attrs.insert(
            "LastModified",
            Value::from(modified).coerce(FieldType::Timestamp),
        );
    }
    Ok(attrs)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Response documents as S3 returns them

    pub const GET_SERVICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner>
    <ID>bcaf1ffd86f41161ca5fb16fd081034f</ID>
    <DisplayName>webfile</DisplayName>
  </Owner>
  <Buckets>
    <Bucket>
      <Name>quotes</Name>
      <CreationDate>2006-02-03T16:45:09.000Z</CreationDate>
    </Bucket>
    <Bucket>
      <Name>samples</Name>
      <CreationDate>2006-02-03T16:41:58.000Z</CreationDate>
    </Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#;

    pub const GET_BUCKET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix/>
  <Marker/>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>my-image.jpg</Key>
    <LastModified>2009-10-12T17:50:30.000Z</LastModified>
    <ETag>&quot;fba9dede5f27731c9771645a39863328&quot;</ETag>
    <Size>434234</Size>
    <StorageClass>STANDARD</StorageClass>
    <Owner>
      <ID>75aa57f09aa0c8caeab4f8c24e99d10f8e7faeebf76c078efc7c6caea54ba06a</ID>
      <DisplayName>mtd@amazon.com</DisplayName>
    </Owner>
  </Contents>
</ListBucketResult>"#;

    pub const GET_BUCKET_LOCATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/">EU</LocationConstraint>"#;

    pub const GET_REQUEST_PAYMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<RequestPaymentConfiguration xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Payer>Requester</Payer>
</RequestPaymentConfiguration>"#;
}
