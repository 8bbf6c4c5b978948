//! # Stratum Mapping (SMAP) Tables
//!
//! A JSP compiler records which template lines produced which servlet lines
//! in a small text blob, the SMAP, and stores it in the compiled class's
//! `SourceDebugExtension` attribute. This module turns that text into a
//! [`MappingTable`].
//!
//! ## Format
//!
//! ```text
//! SMAP                     header: generated file name and default stratum
//! index_jsp.java
//! JSP
//! *S JSP                   stratum section
//! *F                       file section
//! + 0 index.jsp            file id 0 (a `+` entry is followed by its path)
//! index.jsp
//! + 1 header.jspf
//! WEB-INF/jspf/header.jspf
//! *L                       line section
//! 1,5:122                  template 1..=5   -> servlet 122..=126
//! 7,52:128                 template 7..=58  -> servlet 128..=179
//! 1#1,3:90                 file 1, template 1..=3 -> servlet 90..=92
//! 124,4:246,3              template 124..=127 -> servlet 246, 249, 252, 255
//! *E                       end
//! ```
//!
//! A line record is `start[#fileId][,count]:generated[,increment]`. `count`
//! and `increment` default to 1. A record without `#fileId` belongs to the
//! same file as the record before it (the first file for the first record).
//!
//! ## Module Structure
//!
//! - **`segment`**: [`MappingSegment`] and the immutable [`MappingTable`]
//! - **`grammar`**: [`parse`], which selects the records of one template file

pub mod grammar;
pub mod segment;

pub use grammar::parse;
pub use segment::{MappingSegment, MappingTable};
