pub mod mining;
