//! Parser orchestration
//!
//! [`Parser`] owns everything that does not depend on a wire syntax: contained
//! resolution and reference rendering (through [`EncodeRun`]), bundle id
//! normalization after decode, and the string and stream wrappers. A format
//! implements only [`Parser::read_resource`] and [`Parser::write_resource`].

use crate::bundle::{bundle_to_resource, normalize_bundle_ids, resource_to_bundle};
use crate::error::{FormatError, Result};
use crate::options::ParserOptions;
use crate::run::EncodeRun;
use ferrite_context::FhirContext;
use ferrite_models::{Bundle, ResourceHandle};
use std::io::{Read, Write};

pub trait Parser {
    fn context(&self) -> &FhirContext;

    fn options(&self) -> &ParserOptions;

    fn options_mut(&mut self) -> &mut ParserOptions;

    /// Decode one resource. When `resource_type` is given the input must be
    /// of that type.
    fn read_resource(
        &self,
        resource_type: Option<&str>,
        reader: &mut dyn Read,
    ) -> Result<ResourceHandle>;

    /// Encode `resource` with the state of the current run
    fn write_resource(
        &self,
        run: &EncodeRun<'_>,
        resource: &ResourceHandle,
        writer: &mut dyn Write,
    ) -> Result<()>;

    /// Decode a resource; bundles get their identifiers qualified with the
    /// base URLs they carry.
    fn parse_resource<R: Read>(
        &self,
        resource_type: Option<&str>,
        mut reader: R,
    ) -> Result<ResourceHandle>
    where
        Self: Sized,
    {
        let resource = self.read_resource(resource_type, &mut reader)?;
        normalize_bundle_ids(self.context(), &resource)?;
        Ok(resource)
    }

    fn parse_resource_str(&self, resource_type: Option<&str>, input: &str) -> Result<ResourceHandle>
    where
        Self: Sized,
    {
        self.parse_resource(resource_type, input.as_bytes())
    }

    fn parse_bundle<R: Read>(&self, reader: R) -> Result<Bundle>
    where
        Self: Sized,
    {
        let resource = self.parse_resource(Some(crate::bundle::BUNDLE_TYPE), reader)?;
        resource_to_bundle(self.context(), &resource)
    }

    fn parse_bundle_str(&self, input: &str) -> Result<Bundle>
    where
        Self: Sized,
    {
        self.parse_bundle(input.as_bytes())
    }

    fn encode_resource_to_writer<W: Write>(
        &self,
        resource: &ResourceHandle,
        mut writer: W,
    ) -> Result<()>
    where
        Self: Sized,
    {
        let run = EncodeRun::new(self.context(), self.options(), resource)?;
        self.write_resource(&run, resource, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn encode_resource_to_string(&self, resource: &ResourceHandle) -> Result<String>
    where
        Self: Sized,
    {
        let mut buffer = Vec::new();
        in_memory(self.encode_resource_to_writer(resource, &mut buffer))?;
        Ok(String::from_utf8(buffer)?)
    }

    fn encode_bundle_to_writer<W: Write>(&self, bundle: &Bundle, writer: W) -> Result<()>
    where
        Self: Sized,
    {
        let resource = bundle_to_resource(self.context(), bundle)?;
        self.encode_resource_to_writer(&resource, writer)
    }

    fn encode_bundle_to_string(&self, bundle: &Bundle) -> Result<String>
    where
        Self: Sized,
    {
        let mut buffer = Vec::new();
        in_memory(self.encode_bundle_to_writer(bundle, &mut buffer))?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Blank values clear the setting
    fn set_server_base_url(&mut self, url: Option<&str>) -> &mut Self
    where
        Self: Sized,
    {
        self.options_mut().set_server_base_url(url);
        self
    }

    fn set_suppress_narratives(&mut self, suppress: bool) -> &mut Self
    where
        Self: Sized,
    {
        self.options_mut().suppress_narratives = suppress;
        self
    }

    fn set_pretty_print(&mut self, pretty: bool) -> &mut Self
    where
        Self: Sized,
    {
        self.options_mut().pretty_print = pretty;
        self
    }
}

/// Writes into a `Vec<u8>` cannot fail; an I/O error here is a bug.
fn in_memory(result: Result<()>) -> Result<()> {
    match result {
        Err(FormatError::Io(err)) => {
            panic!("Encountered I/O error during write to string - this should not happen: {err}")
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_context::DataFormatError;
    use std::io;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "buffer gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[should_panic(expected = "I/O error during write to string")]
    fn test_in_memory_write_failure_panics() {
        let result = FailingWriter.write_all(b"{}").map_err(FormatError::from);
        let _ = in_memory(result);
    }

    #[test]
    fn test_in_memory_passes_other_errors_through() {
        let err = in_memory(Err(DataFormatError::UnknownResourceType("Spaceship".into()).into()))
            .unwrap_err();
        assert!(err.data_format().is_some());
        assert!(in_memory(Ok(())).is_ok());
    }
}
