mod delivery_test;
