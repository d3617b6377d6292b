pub mod domestic_work;
