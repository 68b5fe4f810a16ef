/**
 * @file mod.rs
 * @author Mike Hamburg
 * @copyright 2020-2022 Rambus Inc.
 *
 * Matrix storage and the register-tile microkernel.  Layouts say where
 * elements live, pointers walk them, and tiles compute on them.
 */
pub mod layout;
pub mod pointer;
pub mod matrix;
pub mod panel;
pub mod tile;
