/*! Support for archiving data to nimbus.io.

The central type is [`PassThruProducer`], a request body of known length that is fed
incrementally while the request is in progress.  Data fed before the request starts, or while
the connection is applying backpressure, is buffered and sent in order.

## Convenience Functions

Most uses of this crate can utilize [`archive`], which POSTs a key's data from a producer and
returns the resulting version identifier, or [`archive_from_buf`], which does the same for an
in-memory buffer.  Conjoined (multi-part) archives are built with [`start_conjoined`],
[`archive_conjoined_part`] and [`finish_conjoined`].

```
# use std::sync::Arc;
# use nimbusio::{Client, Identity};
# use nimbusio_upload::{archive, PassThruProducer};
# use nimbusio::bytes::Bytes;
# async fn f(client: &Client, identity: &Identity) -> anyhow::Result<()> {
let producer = Arc::new(PassThruProducer::new("my-key", 11));
let feeder = {
    let producer = producer.clone();
    tokio::spawn(async move {
        producer.feed(Bytes::from_static(b"hello "));
        producer.feed(Bytes::from_static(b"world"));
    })
};
let result = archive(client, identity, "my-collection", "my-key", producer).await?;
feeder.await?;
println!("archived version {}", result.version_identifier);
# Ok(())
# }
```
*/

mod archive;
mod pass_thru;

pub use archive::{
    archive, archive_conjoined_part, archive_from_buf, finish_conjoined, start_conjoined,
    ArchiveResult, ConjoinedResult,
};
pub use pass_thru::PassThruProducer;
