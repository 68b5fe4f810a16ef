/*
 * @file size.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Serialized size of a matrix, without encoding it anywhere.  Lets callers
 * size a buffer before `bincode::encode_into_slice`.
 */

use bincode::{Encode,config::Config,enc::EncoderImpl,error::EncodeError,enc::write::Writer};

/** A writer that throws the bytes away and counts them */
#[derive(Default)]
struct CountingWriter {
    count: usize
}

impl Writer for CountingWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.count += bytes.len();
        Ok(())
    }
}

/** Number of bytes `obj` encodes to under `config` */
pub fn serialized_size<T:Encode,C:Config>(obj:&T, config:C) -> Result<usize, EncodeError> {
    let mut encoder = EncoderImpl::new(CountingWriter::default(), config);
    obj.encode(&mut encoder)?;
    Ok(encoder.into_writer().count)
}
