pub mod lbfgsb;
